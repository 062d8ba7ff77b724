// ABOUTME: Payment provider integrations for subscription upgrades
// ABOUTME: Paddle webhook verification, on-chain payment lookup and RPC call spacing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

/// Solana and Bitcoin transaction verification
pub mod blockchain;

/// Paddle classic webhook signatures and alerts
pub mod paddle;

/// Per-host spacing of outbound RPC calls
pub mod rate_limit;

pub use blockchain::{
    BitcoinClient, ChainClient, ChainTransfer, RetryPolicy, SolanaClient, Verification,
};
pub use paddle::{AlertUser, PaddleAlert};
pub use rate_limit::RpcRateLimiter;
