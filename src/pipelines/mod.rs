pub mod coordinator;
pub mod otu_identification;
