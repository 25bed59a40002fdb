//! ABI surface of the demo contracts.
//!
//! Only the methods the bootstrap, the read bridge and the devnet touch are
//! declared here.

use alloy_core::primitives::{Address, keccak256};
use alloy_sol_types::{SolCall, sol};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::chain::ChainClient;

sol! {
    /// ERC20 with an open `allocateTo` faucet.
    #[sol(all_derives)]
    interface IMintableToken {
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function allocateTo(address to, uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    /// Custodial vault holding deposits of a single asset.
    #[sol(all_derives)]
    interface IBodega {
        function asset() external view returns (address);
        function admin() external view returns (address);
        function mercado() external view returns (address);
        function setMercado(address mercado) external;
        function deposit(uint256 amount, address onBehalfOf) external;
        function balanceOf(address account) external view returns (uint256);
    }

    /// USD to MXN price feed.
    #[sol(all_derives)]
    interface IPriceOracle {
        function decimals() external view returns (uint8);
        function latestPrice() external view returns (uint256);
    }

    /// Lending market.
    #[sol(all_derives)]
    interface IMercado {
        #[derive(Debug)]
        struct Loan {
            uint256 id;
            address borrower;
            uint256 amount;
            uint256 totalPayment;
            uint256 installments;
            uint256 apyBps;
            uint256 duration;
            string attachedCollateral;
        }

        function usdc() external view returns (address);
        function bodega() external view returns (address);
        function oracle() external view returns (address);
        function getUsersLoanIds(address user) external view returns (uint256[]);
        function getLoan(uint256 loanId) external view returns (Loan);
        function requestLoan(uint256 amount, uint256 installments) external returns (uint256);
    }
}

/// Getter used to read the vault's market binding.
pub const BODEGA_MERCADO_GETTER: &str = "mercado()";
/// Setter used to bind the vault to its market.
pub const BODEGA_MERCADO_SETTER: &str = "setMercado(address)";

/// Four-byte selector of a Solidity function signature such as `mercado()`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Execute a typed read-only call and decode its return values.
pub async fn call_view<C: ChainClient, T: SolCall>(
    client: &C,
    to: Address,
    call: &T,
) -> anyhow::Result<T::Return> {
    let output = client
        .call(to, call.abi_encode().into())
        .await
        .with_context(|| format!("{} on {to} failed", T::SIGNATURE))?;
    T::abi_decode_returns(&output, true)
        .with_context(|| format!("Failed to decode {} output from {to}", T::SIGNATURE))
}

/// What role a deployed contract plays in the system.
///
/// Recorded in the manifest so readers know which records are tokens or markets
/// without inspecting their ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case", tag = "type")]
#[strum(serialize_all = "kebab-case")]
pub enum ContractKind {
    Token { decimals: u8 },
    Vault,
    Oracle,
    Market,
}

impl ContractKind {
    pub fn is_token(&self) -> bool {
        matches!(self, ContractKind::Token { .. })
    }
}
