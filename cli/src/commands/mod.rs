mod advise;
mod goal;
mod helpers;
mod log;
mod profile;
mod summary;

pub(crate) use advise::{cmd_advise, cmd_advise_show};
pub(crate) use goal::{cmd_goal_list, cmd_goal_remove, cmd_goal_set};
pub(crate) use log::{cmd_clear, cmd_log, cmd_logs, cmd_nutrients};
pub(crate) use profile::{ProfileUpdate, cmd_profile_set, cmd_profile_show};
pub(crate) use summary::{cmd_history, cmd_summary};
