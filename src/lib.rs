pub mod error;
pub mod counters;
pub mod lifecycle;
pub mod publisher;
pub mod demo_seeder;

pub mod models {
    pub mod payload;
    pub mod recipe;
}

pub mod auth {
    pub mod models;
    pub mod verifier;
}

pub mod db {
    pub mod counter_repository;
    pub mod memory;
    pub mod repository;
}

pub mod query {
    pub mod builder;
    pub mod mongo;
    pub mod pagination;
}

pub mod storage {
    pub mod client;
}

#[cfg(feature = "server")]
pub mod app;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod api {
    pub mod errors;
    pub mod recipes;
    pub mod upload;
}
