/// Remote nodes publish on `Status-HEAT/<node-tag>`.
pub const TOPIC_NODE_STATUS_PREFIX: &str = "Status-HEAT/";
pub const TOPIC_NODE_STATUS_FILTER: &str = "Status-HEAT/+";

pub const TOPIC_CONTROLLER_STATE: &str = "hvac/controller/state";
pub const TOPIC_CONTROLLER_ALERT: &str = "hvac/controller/alert";
pub const TOPIC_CONTROLLER_REPORT: &str = "hvac/controller/report";
pub const TOPIC_CONTROLLER_RESULT: &str = "hvac/controller/result";

pub const TOPIC_CMD_MANUAL: &str = "hvac/cmnd/manual";
