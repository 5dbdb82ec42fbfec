pub mod graphql;
pub mod model;
pub mod redact;
pub mod summarize;

pub use graphql::{format_graphql_text, graphql_ops, GraphQlOp, GraphQlSummary};
pub use model::{read_file, HarFile};
pub use redact::{redact_file, redact_value, RedactOptions};
pub use summarize::{format_summary_text, summarize, EndpointCount, Summary};
