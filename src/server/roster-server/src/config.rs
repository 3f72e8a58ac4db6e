//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use roster_esi::client::DEFAULT_BASE_URL;
use roster_esi::EsiConfig;
use roster_sync::SyncConfig;

/// What to do with the login when the group sync fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncFailurePolicy {
    /// Log the failure and let the user in with their current groups.
    Proceed,
    /// Reject the login.
    Abort,
}

#[derive(Parser, Debug)]
#[command(name = "roster-server")]
#[command(about = "Roster - EVE Online corporation group sync for wiki logins")]
#[command(version)]
pub struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8300", env = "ROSTER_BIND_ADDRESS")]
    pub bind: String,

    /// Enable development mode (in-memory storage)
    #[arg(long, env = "ROSTER_DEV_MODE")]
    pub dev: bool,

    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "ROSTER_DATA_DIR")]
    pub data_dir: PathBuf,

    /// ESI base URL
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "ROSTER_ESI_URL")]
    pub esi_url: String,

    /// ESI request timeout in seconds
    #[arg(long, default_value_t = 10, env = "ROSTER_ESI_TIMEOUT_SECS")]
    pub esi_timeout_secs: u64,

    /// Comma-separated corporation ids whose characters are members
    #[arg(long, default_value = "", env = "ROSTER_CORP_IDS")]
    pub corp_ids: String,

    /// Comma-separated alliance ids whose characters are members
    #[arg(long, default_value = "", env = "ROSTER_ALLIANCE_IDS")]
    pub alliance_ids: String,

    /// Comma-separated names of the groups every member receives
    #[arg(long, default_value = "", env = "ROSTER_MEMBER_GROUP_NAMES")]
    pub member_group_names: String,

    /// Comma-separated keywords protecting groups from automatic removal
    #[arg(long, default_value = "", env = "ROSTER_KEYWORD_BLACKLIST")]
    pub keyword_blacklist: String,

    /// Assign groups from corporation roles and titles
    #[arg(long, env = "ROSTER_USE_AUTO_ROLES")]
    pub use_auto_roles: bool,

    /// Behaviour when the group sync fails
    #[arg(long, value_enum, default_value_t = SyncFailurePolicy::Proceed, env = "ROSTER_ON_SYNC_FAILURE")]
    pub on_sync_failure: SyncFailurePolicy,

    /// Where to send users after logout
    #[arg(long, env = "ROSTER_LOGOUT_URL")]
    pub logout_url: Option<String>,
}

impl Cli {
    /// Synchronizer settings.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_corp_ids(&self.corp_ids)
            .with_alliance_ids(&self.alliance_ids)
            .with_member_group_names(&self.member_group_names)
            .with_keyword_blacklist(&self.keyword_blacklist)
            .with_auto_roles(self.use_auto_roles)
    }

    /// ESI client settings.
    pub fn esi_config(&self) -> EsiConfig {
        EsiConfig {
            base_url: self.esi_url.clone(),
            timeout: Duration::from_secs(self.esi_timeout_secs),
            ..EsiConfig::default()
        }
    }
}
