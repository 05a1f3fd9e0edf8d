/// Parameters of one presence leave call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
}
