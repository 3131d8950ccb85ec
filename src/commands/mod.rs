pub type CmdResult<T> = stagehand::Result<(T, i32)>;

pub mod tasks;

pub(crate) fn run_json(args: tasks::TaskArgs) -> (stagehand::Result<serde_json::Value>, i32) {
    crate::tty::status("stagehand is working...");
    crate::output::map_cmd_result_to_json(tasks::run(args))
}
