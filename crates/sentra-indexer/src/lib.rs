//! sentra-indexer
//!
//! The reorg-safe event source. Primary path queries a GraphQL indexer;
//! the fallback paginates direct substrate-log queries. Processed block
//! hashes are cached (bounded) and re-checked every cycle; a mismatch
//! rewinds the cursor and purges derived events so canonical-chain
//! re-ingest can proceed idempotently.

pub mod config;
pub mod graphql;
pub mod parser;
pub mod ring;
pub mod rpc;
pub mod source;
pub mod wire;

pub use config::IndexerConfig;
pub use graphql::GraphQlIndexerClient;
pub use parser::{ParserRegistry, ProtocolParser, SimplePoolParser};
pub use ring::EndpointRing;
pub use rpc::HttpSubstrateClient;
pub use source::{EventSource, IndexerApi, SubstrateApi, SyncOutcome};
