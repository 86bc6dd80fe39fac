pub mod data;
pub mod history;
pub mod odds;
pub mod prediction;
