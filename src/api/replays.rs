use crate::api::rpc::ReplaySummary;
use crate::reconcile::ReplayResult;
use crate::utils::format_span;

impl From<&ReplayResult> for ReplaySummary {
    fn from(result: &ReplayResult) -> ReplaySummary {
        ReplaySummary {
            started: result.started.timestamp(),
            ended: result.ended.timestamp(),
            duration: format_span(result.started, Some(result.ended)),
            state: result.state.to_string(),
            succeeded: result.succeeded,
            stale_count: result.stale_count,
            cleared_count: result.cleared_count,
        }
    }
}
