pub mod cmd;
pub mod common;
pub mod inventory;
pub mod metastore;
pub mod planner;
pub mod rebalance;
pub mod resolver;
pub mod rewriter;
pub mod thrift;
pub mod ufs;
