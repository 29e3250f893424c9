pub mod pipeline;

pub use pipeline::{
    Resolver, STAGES, Stage, cover_query, remote_cover_url, remote_cover_url_blocking,
    resolve_blocking,
};
