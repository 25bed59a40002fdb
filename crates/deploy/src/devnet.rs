//! In-process development network.
//!
//! `Devnet` implements [`ChainClient`] for dry runs and tests. It does not run
//! EVM bytecode: each creation bytecode registered with [`Devnet::install`] maps
//! to a built-in model of one of the demo contracts (token, vault, oracle,
//! market), and calls are decoded against that contract's ABI.
//!
//! Transactions are mined immediately, one block each, and are atomic: a
//! reverting transaction leaves no trace except the error returned to the
//! sender.

use std::collections::HashMap;

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, B256, Bytes, U256, keccak256},
};
use alloy_sol_types::{SolCall, SolInterface};
use anyhow::Context;
use parking_lot::Mutex;

use crate::{
    accounts::{DEV_MNEMONIC, derive_addresses},
    artifact::SyntheticArtifacts,
    chain::{ChainClient, ChainError, TransactionRequest, TxReceipt},
    contracts::{ContractKind, IBodega, IMercado, IMintableToken, IPriceOracle},
    plan::BootstrapPlan,
};

/// Number of unlocked accounts, matching Hardhat's default.
pub const DEVNET_ACCOUNTS: usize = 10;

/// Chain id Hardhat and Anvil use by default.
pub const DEVNET_CHAIN_ID: u64 = 31337;

/// USD/MXN price reported by the oracle model (6 decimals).
pub const ORACLE_PRICE: u64 = 17_250_000;
const ORACLE_DECIMALS: u8 = 6;

/// Interest of loans opened on the market model, in basis points.
const LOAN_APY_BPS: u64 = 1_000;
const SECONDS_PER_INSTALLMENT: u64 = 30 * 24 * 60 * 60;

type Revert = String;

#[derive(Debug, Clone, Default)]
struct TokenState {
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl TokenState {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        let from_balance = self.balance(from);
        if from_balance < amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
        self.balances.insert(from, from_balance - amount);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct VaultState {
    asset: Address,
    admin: Address,
    mercado: Address,
    deposits: HashMap<Address, U256>,
}

#[derive(Debug, Clone)]
struct MarketState {
    usdc: Address,
    bodega: Address,
    oracle: Address,
    loans: Vec<IMercado::Loan>,
    user_loans: HashMap<Address, Vec<U256>>,
}

#[derive(Debug, Clone)]
enum ContractState {
    Token(TokenState),
    Vault(VaultState),
    Oracle,
    Market(MarketState),
}

#[derive(Debug, Clone)]
struct DeployedContract {
    code: Bytes,
    state: ContractState,
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, DeployedContract>,
    receipts: HashMap<B256, TxReceipt>,
    transactions: Vec<TransactionRequest>,
}

/// An in-memory chain that understands the demo contracts.
#[derive(Debug)]
pub struct Devnet {
    chain_id: u64,
    accounts: Vec<Address>,
    programs: Mutex<Vec<(Bytes, ContractKind)>>,
    state: Mutex<ChainState>,
}

impl Devnet {
    /// An empty chain with the development accounts unlocked.
    pub fn new(chain_id: u64) -> anyhow::Result<Self> {
        let accounts = derive_addresses(DEV_MNEMONIC, DEVNET_ACCOUNTS)
            .context("Failed to derive devnet accounts")?;
        Ok(Self {
            chain_id,
            accounts,
            programs: Mutex::new(Vec::new()),
            state: Mutex::new(ChainState::default()),
        })
    }

    /// A chain that recognises the synthetic bytecode of every contract in `plan`.
    pub fn from_plan(chain_id: u64, plan: &BootstrapPlan) -> anyhow::Result<Self> {
        let devnet = Self::new(chain_id)?;
        for step in &plan.deploys {
            devnet.install(SyntheticArtifacts::bytecode(&step.artifact), step.kind);
        }
        Ok(devnet)
    }

    /// Make creation transactions starting with `bytecode` create a `kind` contract.
    pub fn install(&self, bytecode: Bytes, kind: ContractKind) {
        self.programs.lock().push((bytecode, kind));
    }

    pub fn dev_accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Every transaction accepted so far, in order.
    pub fn transactions(&self) -> Vec<TransactionRequest> {
        self.state.lock().transactions.clone()
    }

    /// Number of accepted contract creations.
    pub fn creations(&self) -> usize {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|tx| tx.to.is_none())
            .count()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Forget all state, as a restarted development node does.
    pub fn reset(&self) {
        *self.state.lock() = ChainState::default();
    }

    /// Point a deployed vault at a market without going through its admin.
    pub fn force_vault_binding(&self, vault: Address, mercado: Address) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        match state.contracts.get_mut(&vault).map(|c| &mut c.state) {
            Some(ContractState::Vault(vault_state)) => {
                vault_state.mercado = mercado;
                Ok(())
            }
            _ => anyhow::bail!("no vault deployed at {vault}"),
        }
    }

    fn program(&self, init_code: &[u8]) -> Option<(usize, ContractKind)> {
        self.programs
            .lock()
            .iter()
            .find(|(code, _)| init_code.starts_with(code))
            .map(|(code, kind)| (code.len(), *kind))
    }

    fn apply(&self, state: &mut ChainState, tx: &TransactionRequest) -> Result<Option<Address>, Revert> {
        match tx.to {
            None => {
                let nonce = state.nonces.get(&tx.from).copied().unwrap_or_default();
                let address = tx.from.create(nonce);
                let (code_len, kind) = self
                    .program(&tx.data)
                    .ok_or_else(|| "unknown creation bytecode".to_string())?;
                let contract = construct(state, kind, tx.from, &tx.data[code_len..])?;
                state.contracts.insert(
                    address,
                    DeployedContract {
                        code: Bytes::copy_from_slice(&tx.data[..code_len]),
                        state: contract,
                    },
                );
                Ok(Some(address))
            }
            Some(to) => {
                execute(state, tx.from, to, &tx.data)?;
                Ok(None)
            }
        }
    }
}

fn construct(
    state: &ChainState,
    kind: ContractKind,
    sender: Address,
    args: &[u8],
) -> Result<ContractState, Revert> {
    let addresses = |count: usize| -> Result<Vec<Address>, Revert> {
        let decoded = DynSolType::Tuple(vec![DynSolType::Address; count])
            .abi_decode_params(args)
            .map_err(|e| format!("invalid constructor arguments: {e}"))?;
        match decoded {
            DynSolValue::Tuple(values) => Ok(values
                .iter()
                .filter_map(DynSolValue::as_address)
                .collect()),
            _ => Err("invalid constructor arguments".to_string()),
        }
    };
    let require_contract = |address: Address, what: &str| -> Result<(), Revert> {
        if address.is_zero() || !state.contracts.contains_key(&address) {
            return Err(format!("{what} is not a contract"));
        }
        Ok(())
    };

    Ok(match kind {
        ContractKind::Token { decimals } => ContractState::Token(TokenState {
            decimals,
            ..Default::default()
        }),
        ContractKind::Oracle => ContractState::Oracle,
        ContractKind::Vault => {
            let [asset, admin] = addresses(2)?[..] else {
                return Err("invalid constructor arguments".to_string());
            };
            require_contract(asset, "asset")?;
            ContractState::Vault(VaultState {
                asset,
                admin: if admin.is_zero() { sender } else { admin },
                mercado: Address::ZERO,
                deposits: HashMap::new(),
            })
        }
        ContractKind::Market => {
            let [usdc, bodega, oracle] = addresses(3)?[..] else {
                return Err("invalid constructor arguments".to_string());
            };
            require_contract(usdc, "usdc")?;
            require_contract(bodega, "bodega")?;
            require_contract(oracle, "oracle")?;
            ContractState::Market(MarketState {
                usdc,
                bodega,
                oracle,
                loans: Vec::new(),
                user_loans: HashMap::new(),
            })
        }
    })
}

fn token_mut(state: &mut ChainState, address: Address) -> Result<&mut TokenState, Revert> {
    match state.contracts.get_mut(&address).map(|c| &mut c.state) {
        Some(ContractState::Token(token)) => Ok(token),
        _ => Err(format!("{address} is not a token")),
    }
}

fn decode<I: SolInterface>(data: &[u8]) -> Result<I, Revert> {
    I::abi_decode(data, true).map_err(|e| format!("function not found: {e}"))
}

fn execute(state: &mut ChainState, sender: Address, to: Address, data: &[u8]) -> Result<Vec<u8>, Revert> {
    let Some(contract) = state.contracts.get_mut(&to) else {
        // Calls to accounts succeed and do nothing.
        return Ok(Vec::new());
    };

    match &mut contract.state {
        ContractState::Token(token) => execute_token(token, sender, data),
        ContractState::Oracle => execute_oracle(data),
        ContractState::Vault(vault) => {
            use IBodega::IBodegaCalls as Call;
            match decode::<Call>(data)? {
                Call::asset(_) => Ok(IBodega::assetCall::abi_encode_returns(&(vault.asset,))),
                Call::admin(_) => Ok(IBodega::adminCall::abi_encode_returns(&(vault.admin,))),
                Call::mercado(_) => Ok(IBodega::mercadoCall::abi_encode_returns(&(vault.mercado,))),
                Call::balanceOf(call) => {
                    let deposit = vault.deposits.get(&call.account).copied().unwrap_or_default();
                    Ok(IBodega::balanceOfCall::abi_encode_returns(&(deposit,)))
                }
                Call::setMercado(call) => {
                    if sender != vault.admin {
                        return Err("Bodega: caller is not the admin".to_string());
                    }
                    if !vault.mercado.is_zero() && vault.mercado != call.mercado {
                        return Err("Bodega: mercado already set".to_string());
                    }
                    vault.mercado = call.mercado;
                    Ok(Vec::new())
                }
                Call::deposit(call) => {
                    if call.amount.is_zero() {
                        return Err("Bodega: zero deposit".to_string());
                    }
                    let asset = vault.asset;
                    *vault.deposits.entry(call.onBehalfOf).or_default() += call.amount;

                    let token = token_mut(state, asset)?;
                    let allowance = token.allowance(sender, to);
                    if allowance < call.amount {
                        return Err("ERC20: insufficient allowance".to_string());
                    }
                    token.move_balance(sender, to, call.amount)?;
                    if allowance != U256::MAX {
                        token.allowances.insert((sender, to), allowance - call.amount);
                    }
                    Ok(Vec::new())
                }
            }
        }
        ContractState::Market(market) => {
            use IMercado::IMercadoCalls as Call;
            match decode::<Call>(data)? {
                Call::usdc(_) => Ok(IMercado::usdcCall::abi_encode_returns(&(market.usdc,))),
                Call::bodega(_) => Ok(IMercado::bodegaCall::abi_encode_returns(&(market.bodega,))),
                Call::oracle(_) => Ok(IMercado::oracleCall::abi_encode_returns(&(market.oracle,))),
                Call::getUsersLoanIds(call) => {
                    let ids = market.user_loans.get(&call.user).cloned().unwrap_or_default();
                    Ok(IMercado::getUsersLoanIdsCall::abi_encode_returns(&(ids,)))
                }
                Call::getLoan(call) => {
                    let loan = usize::try_from(call.loanId)
                        .ok()
                        .and_then(|id| id.checked_sub(1))
                        .and_then(|index| market.loans.get(index))
                        .ok_or_else(|| "Mercado: unknown loan".to_string())?;
                    Ok(IMercado::getLoanCall::abi_encode_returns(&(loan.clone(),)))
                }
                Call::requestLoan(call) => {
                    if call.amount.is_zero() || call.installments.is_zero() {
                        return Err("Mercado: invalid loan terms".to_string());
                    }
                    // Loan ids start at 1; 0 means "no loan".
                    let id = U256::from(market.loans.len() + 1);
                    let interest = call.amount * U256::from(LOAN_APY_BPS) / U256::from(10_000u64);
                    market.loans.push(IMercado::Loan {
                        id,
                        borrower: sender,
                        amount: call.amount,
                        totalPayment: call.amount + interest,
                        installments: call.installments,
                        apyBps: U256::from(LOAN_APY_BPS),
                        duration: call.installments * U256::from(SECONDS_PER_INSTALLMENT),
                        attachedCollateral: "XOC".to_string(),
                    });
                    market.user_loans.entry(sender).or_default().push(id);
                    Ok(IMercado::requestLoanCall::abi_encode_returns(&(id,)))
                }
            }
        }
    }
}

fn execute_token(token: &mut TokenState, sender: Address, data: &[u8]) -> Result<Vec<u8>, Revert> {
    use IMintableToken::IMintableTokenCalls as Call;
    Ok(match decode::<Call>(data)? {
        Call::decimals(_) => IMintableToken::decimalsCall::abi_encode_returns(&(token.decimals,)),
        Call::totalSupply(_) => {
            IMintableToken::totalSupplyCall::abi_encode_returns(&(token.total_supply,))
        }
        Call::balanceOf(call) => {
            IMintableToken::balanceOfCall::abi_encode_returns(&(token.balance(call.account),))
        }
        Call::allowance(call) => IMintableToken::allowanceCall::abi_encode_returns(&(
            token.allowance(call.owner, call.spender),
        )),
        Call::allocateTo(call) => {
            token.total_supply = token
                .total_supply
                .checked_add(call.amount)
                .ok_or_else(|| "ERC20: supply overflow".to_string())?;
            *token.balances.entry(call.to).or_default() += call.amount;
            Vec::new()
        }
        Call::approve(call) => {
            token.allowances.insert((sender, call.spender), call.amount);
            IMintableToken::approveCall::abi_encode_returns(&(true,))
        }
        Call::transfer(call) => {
            token.move_balance(sender, call.to, call.amount)?;
            IMintableToken::transferCall::abi_encode_returns(&(true,))
        }
        Call::transferFrom(call) => {
            let allowance = token.allowance(call.from, sender);
            if allowance < call.amount {
                return Err("ERC20: insufficient allowance".to_string());
            }
            token.move_balance(call.from, call.to, call.amount)?;
            if allowance != U256::MAX {
                token
                    .allowances
                    .insert((call.from, sender), allowance - call.amount);
            }
            IMintableToken::transferFromCall::abi_encode_returns(&(true,))
        }
    })
}

fn execute_oracle(data: &[u8]) -> Result<Vec<u8>, Revert> {
    use IPriceOracle::IPriceOracleCalls as Call;
    Ok(match decode::<Call>(data)? {
        Call::decimals(_) => IPriceOracle::decimalsCall::abi_encode_returns(&(ORACLE_DECIMALS,)),
        Call::latestPrice(_) => {
            IPriceOracle::latestPriceCall::abi_encode_returns(&(U256::from(ORACLE_PRICE),))
        }
    })
}

impl ChainClient for Devnet {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> anyhow::Result<B256> {
        if !self.accounts.contains(&tx.from) {
            return Err(ChainError::Rejected(format!("unknown account {}", tx.from)).into());
        }

        let mut state = self.state.lock();
        let mut next = state.clone();
        let contract_address = self
            .apply(&mut next, &tx)
            .map_err(|reason| ChainError::Rejected(format!("execution reverted: {reason}")))?;

        let nonce = next.nonces.entry(tx.from).or_default();
        let tx_hash = keccak256(
            [
                tx.from.as_slice(),
                nonce.to_be_bytes().as_slice(),
                self.chain_id.to_be_bytes().as_slice(),
            ]
            .concat(),
        );
        *nonce += 1;
        next.block_number += 1;
        let receipt = TxReceipt {
            tx_hash,
            block_number: next.block_number,
            success: true,
            contract_address,
        };
        next.receipts.insert(tx_hash, receipt);
        next.transactions.push(tx);

        *state = next;
        tracing::trace!(%tx_hash, block = state.block_number, "Devnet transaction mined");
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> anyhow::Result<Option<TxReceipt>> {
        Ok(self.state.lock().receipts.get(&tx_hash).cloned())
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let mut scratch = self.state.lock().clone();
        let output = execute(&mut scratch, Address::ZERO, to, &data)
            .map_err(|reason| ChainError::Rejected(format!("execution reverted: {reason}")))?;
        Ok(Bytes::from(output))
    }

    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        Ok(self
            .state
            .lock()
            .contracts
            .get(&address)
            .map(|contract| contract.code.clone())
            .unwrap_or_default())
    }
}
