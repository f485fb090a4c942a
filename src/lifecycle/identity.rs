//! Execution identity.
//!
//! # Responsibilities
//! - Resolve the configured account to a uid/gid
//! - Decide whether to keep the current identity, drop to the target, or refuse
//! - Drop privileges (supplementary groups, gid, uid) and verify the result
//!
//! # Design Decisions
//! - Established once, before any step runs; children inherit it
//! - Root is refused unless explicitly allowed
//! - The decision is a pure function so the policy is testable without root

use nix::unistd::{getegid, geteuid, getgid, getuid, setgid, setuid, Gid, Group, Uid, User};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::IdentityConfig;

/// Effective uid/gid of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub fn current() -> Self {
        Self {
            uid: geteuid().as_raw(),
            gid: getegid().as_raw(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// The account the steps should run as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// Outcome of the identity policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue as the current identity.
    Keep(Credentials),
    /// Switch to the target before running anything.
    Drop(TargetIdentity),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("refusing to run as root; set identity.user or identity.allow_root")]
    RootRefused,

    #[error("running as uid {current_uid} cannot switch to '{name}' (uid {uid}) without privileges")]
    CannotSwitch { current_uid: u32, name: String, uid: u32 },

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("account lookup failed: {0}")]
    Lookup(#[source] nix::Error),

    #[error("failed to drop privileges to '{name}': {source}")]
    Drop {
        name: String,
        #[source]
        source: nix::Error,
    },

    #[error("identity verification failed: {0}")]
    Verify(String),
}

/// Decide what to do with the current identity.
pub fn resolve_transition(
    current: Credentials,
    target: Option<&TargetIdentity>,
    allow_root: bool,
) -> Result<Transition, IdentityError> {
    let Some(target) = target else {
        if current.is_root() && !allow_root {
            return Err(IdentityError::RootRefused);
        }
        return Ok(Transition::Keep(current));
    };

    if target.uid == 0 && !allow_root {
        return Err(IdentityError::RootRefused);
    }

    if target.uid == current.uid && target.gid == current.gid {
        return Ok(Transition::Keep(current));
    }

    if current.is_root() {
        Ok(Transition::Drop(target.clone()))
    } else {
        Err(IdentityError::CannotSwitch {
            current_uid: current.uid,
            name: target.name.clone(),
            uid: target.uid,
        })
    }
}

/// Resolve `identity.user` / `identity.group` to ids. Numeric ids are accepted
/// for accounts missing from `/etc/passwd`.
pub fn lookup_target(config: &IdentityConfig) -> Result<Option<TargetIdentity>, IdentityError> {
    let Some(user_name) = &config.user else {
        return Ok(None);
    };

    let (name, uid, primary_gid) = match User::from_name(user_name).map_err(IdentityError::Lookup)? {
        Some(user) => (user.name, user.uid.as_raw(), user.gid.as_raw()),
        None => {
            let uid: u32 = user_name
                .parse()
                .map_err(|_| IdentityError::UnknownUser(user_name.clone()))?;
            (user_name.clone(), uid, uid)
        }
    };

    let gid = match &config.group {
        Some(group_name) => match Group::from_name(group_name).map_err(IdentityError::Lookup)? {
            Some(group) => group.gid.as_raw(),
            None => group_name
                .parse()
                .map_err(|_| IdentityError::UnknownGroup(group_name.clone()))?,
        },
        None => primary_gid,
    };

    Ok(Some(TargetIdentity { name, uid, gid }))
}

/// Apply the identity policy to this process. Call once, before any step.
pub fn establish(config: &IdentityConfig) -> Result<Credentials, IdentityError> {
    let target = lookup_target(config)?;
    let current = Credentials::current();

    match resolve_transition(current, target.as_ref(), config.allow_root)? {
        Transition::Keep(creds) => {
            if creds.is_root() {
                warn!(uid = creds.uid, gid = creds.gid, "Running steps as root (identity.allow_root)");
            } else {
                info!(uid = creds.uid, gid = creds.gid, "Execution identity established");
            }
            Ok(creds)
        }
        Transition::Drop(target) => {
            drop_privileges(&target)?;
            let now = verify(&target)?;
            info!(user = %target.name, uid = now.uid, gid = now.gid, "Dropped privileges");
            Ok(now)
        }
    }
}

fn drop_privileges(target: &TargetIdentity) -> Result<(), IdentityError> {
    let gid = Gid::from_raw(target.gid);
    let to_err = |source| IdentityError::Drop {
        name: target.name.clone(),
        source,
    };

    // Supplementary groups first; they can only be cleared while still root.
    #[cfg(target_os = "linux")]
    nix::unistd::setgroups(&[gid]).map_err(to_err)?;
    setgid(gid).map_err(to_err)?;
    setuid(Uid::from_raw(target.uid)).map_err(to_err)?;
    Ok(())
}

fn verify(target: &TargetIdentity) -> Result<Credentials, IdentityError> {
    let now = Credentials::current();
    let real = (getuid().as_raw(), getgid().as_raw());
    if now.uid != target.uid || now.gid != target.gid || real != (target.uid, target.gid) {
        return Err(IdentityError::Verify(format!(
            "expected uid {}/gid {}, got effective {}/{} real {}/{}",
            target.uid, target.gid, now.uid, now.gid, real.0, real.1
        )));
    }
    if target.uid != 0 && setuid(Uid::from_raw(0)).is_ok() {
        return Err(IdentityError::Verify("root privileges could be regained".into()));
    }
    Ok(now)
}
