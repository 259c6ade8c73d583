mod csv;
mod engine;
mod types;

pub use csv::{CSV_FILENAME, monthly_csv};
pub use engine::{project, rtm_episode_value};
pub use types::{Aggregates, FunnelInputs, MonthPoint, RtmCodeBreakdown};
