use alloy::primitives::{Address, TxHash, address};

use crate::{config::PipelineConfig, ledger::TxReceipt, token::TokenDescriptor};

pub const WALLET: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const POOL: Address = address!("0xFAD57d2039C21811C8F2B5D5B65308aa99D31559");

pub fn tx(n: u8) -> TxHash {
    TxHash::with_last_byte(n)
}

pub fn ok_receipt(n: u8) -> TxReceipt {
    TxReceipt::succeeded(tx(n))
}

pub fn config() -> PipelineConfig {
    PipelineConfig::default()
}

pub fn usdc() -> TokenDescriptor {
    config().input_token
}

pub fn link() -> TokenDescriptor {
    config().output_token
}
