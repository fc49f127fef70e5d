//! Liaison Node - Agent Host for the Liaison Mesh
//!
//! Hosts one agent: transport endpoint, directory self-registration, ping
//! responder and role behaviour (intake, parser, logic or monitor).
//!
//! # Configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LIAISON_ROLE` | `monitor` |
//! | `LIAISON_NAME` | `<role>@liaison` |
//! | `LIAISON_LISTEN` | `127.0.0.1:7100` |
//! | `LIAISON_DIRECTORY` | `127.0.0.1:7000` |
//! | `LIAISON_INTAKE` | `127.0.0.1:5000` (user), `0.0.0.0:5001` (query) |
//! | `LIAISON_API` | unset (status API off) |
//! | `FRONT_HOST` / `FRONT_PORT` | `127.0.0.1` / `5002` |
//! | `MONITOR_URL` / `MONITOR_PORT` | unset / `4100` |

pub mod api;
pub mod config;
pub mod error;
pub mod intake;
pub mod monitor;
pub mod node;
pub mod payload;
pub mod roles;

pub use config::{NodeConfig, Role, PARSER_FAILURE, QUERY_FAILURE, USER_FAILURE};
pub use error::{Error, Result};
pub use intake::{InputSender, IntakeListener};
pub use monitor::{DfEvent, DfEventKind, MonitorSink};
pub use node::AgentNode;
pub use payload::PayloadKind;
pub use roles::{EchoEvaluator, Evaluator, PassThroughTranslator, Translator};
