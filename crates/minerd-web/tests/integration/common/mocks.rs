//! mockall doubles of the collaborator traits.

use std::path::Path;

use minerd_core::{
    Miner, MinerServer, MinerSettings, MiningInfo, NonceOutcome, NonceSubmission, PlotDirAction,
    Result, SettingsUpdate,
};
use mockall::mock;

mock! {
    pub Rig {}

    impl Miner for Rig {
        fn current_info(&self) -> MiningInfo;
        fn settings(&self) -> MinerSettings;
        fn apply_settings(&self, update: &SettingsUpdate) -> Result<()>;
        fn change_plot_dir(&self, action: PlotDirAction, path: &Path) -> Result<()>;
        fn rescan_plot_directories(&self);
        fn check_plot_file(&self, path: &Path) -> Result<()>;
        fn check_all_plot_files(&self);
        fn submit_nonce(&self, submission: &NonceSubmission) -> Result<NonceOutcome>;
    }
}

mock! {
    pub Host {}

    impl MinerServer for Host {
        fn propagate_config_change(&self);
        fn shutdown(&self);
        fn restart(&self);
    }
}

pub fn block(height: u64) -> MiningInfo {
    MiningInfo {
        height,
        base_target: 70312,
        generation_signature: "<sig>".to_string(),
        target_deadline: 86400,
    }
}

/// A rig that answers read-only queries and rejects nothing.
pub fn quiet_rig() -> MockRig {
    let mut rig = MockRig::new();
    rig.expect_current_info().returning(|| block(1234));
    rig.expect_settings().returning(MinerSettings::default);
    rig
}
