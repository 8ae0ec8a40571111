pub mod osm;
pub mod tables;
