pub mod about;
pub mod brief;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod formulation;
pub mod journal;
pub mod mini_plan;
pub mod profile;
pub mod ranker;
pub mod request;
pub mod store;
pub mod table;

pub use nutriwave_protocol::{
    Candidate, CustomerProfile, FormulaComponent, GenerationPack, Lang, MiniPlan, Texture,
};
