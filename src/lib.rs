// ipfrax - ledger-transaction orchestration for fractionalized IP assets
//
// A marketplace backend mints a fractional-ownership token per patent,
// deploys an on-ledger escrow program that custodies the token and its sale
// price, processes buy orders against that escrow, and tears it down again.
// This crate is that orchestration layer: the UI, routing, and listing
// metadata store sit above it and only consume the identifiers and state
// values returned here.

pub mod escrow;
pub mod identity;
pub mod ledger;
pub mod market;
