//! Data models for wbi-core

pub mod district_map;

pub use district_map::DistrictRiskMap;
