//! Role coordinator - decides once per process whether this node is the
//! primary or a replica
//!
//! The role comes from configuration, never from runtime negotiation.
//! Write paths that only the primary may take (advancing clocks, writing
//! authoritative state) require a [`PrimaryAuthority`] token, which can only
//! be obtained from a primary role.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Role;

/// Proof that the caller runs on the primary node
///
/// Zero-sized; constructible only through [`Role::authority`].
#[derive(Debug, Clone, Copy)]
pub struct PrimaryAuthority {
    _private: (),
}

impl Role {
    /// Authority token if this role is primary
    pub fn authority(&self) -> Option<PrimaryAuthority> {
        self.is_primary().then_some(PrimaryAuthority { _private: () })
    }
}

/// Inputs the role is derived from, highest precedence first
#[derive(Debug, Clone, Default)]
pub struct RoleSources {
    /// `--primary` was passed
    pub cli_primary: bool,
    /// `--replica` was passed
    pub cli_replica: bool,
    /// `role` from the config file
    pub config_role: Option<Role>,
    /// `primary_hostname` from the config file
    pub primary_hostname: Option<String>,
    /// This machine's hostname
    pub hostname: Option<String>,
}

/// Fixed role of this process
#[derive(Debug, Clone, Copy)]
pub struct RoleCoordinator {
    role: Role,
}

impl RoleCoordinator {
    /// Establish the role from command line, config and hostname
    ///
    /// Precedence: command-line flag, then `role` in config, then a
    /// hostname match against `primary_hostname`. No source at all is a
    /// fatal setup error.
    pub fn establish(sources: &RoleSources) -> ConfigResult<Self> {
        let role = match (sources.cli_primary, sources.cli_replica) {
            (true, true) => return Err(ConfigError::ConflictingRole),
            (true, false) => Role::Primary,
            (false, true) => Role::Replica,
            (false, false) => match (sources.config_role, &sources.primary_hostname) {
                (Some(role), _) => role,
                (None, Some(primary)) => match &sources.hostname {
                    Some(host) if host.eq_ignore_ascii_case(primary) => Role::Primary,
                    Some(_) => Role::Replica,
                    None => return Err(ConfigError::NoRole),
                },
                (None, None) => return Err(ConfigError::NoRole),
            },
        };
        log::info!("[ROLE] Node established as {}", role);
        Ok(Self { role })
    }

    /// Coordinator with an already known role
    pub fn fixed(role: Role) -> Self {
        Self { role }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn authority(&self) -> Option<PrimaryAuthority> {
        self.role.authority()
    }
}

/// Hostname of this machine, if it can be determined
///
/// Reads `HOSTNAME`, falling back to `/etc/hostname`.
pub fn local_hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
