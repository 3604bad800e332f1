mod chat;
mod coach;
mod daily;
mod helpers;
mod summary;
mod sync;
mod target;
mod workout;

pub(crate) use chat::cmd_chat;
pub(crate) use coach::cmd_coach;
pub(crate) use daily::{cmd_supplement, cmd_water, cmd_weight};
pub(crate) use summary::{cmd_history, cmd_report, cmd_summary};
pub(crate) use sync::cmd_sync;
pub(crate) use target::{TargetArgs, cmd_target_set, cmd_target_show};
pub(crate) use workout::{
    SetArgs, cmd_exercises, cmd_template_list, cmd_template_load, cmd_template_save,
    cmd_workout_add, cmd_workout_add_set, cmd_workout_remove, cmd_workout_set, cmd_workout_show,
};
