pub mod ranking;
pub mod smiles;
