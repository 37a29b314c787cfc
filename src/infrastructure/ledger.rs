use super::abi;
use crate::config::LedgerConfig;
use crate::domain::ports::LedgerGateway;
use crate::domain::vehicle::{PaymentRecord, Registration, VehicleInfo};
use crate::error::LedgerError;
use async_trait::async_trait;
use ethers_core::abi::Token;
use ethers_core::types::{Address, H256};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// EIP-1193 "user rejected request".
const USER_REJECTED: i64 = 4001;
/// EIP-1193 "unauthorized", used when no account is available to sign.
const NO_ACCOUNT: i64 = 4100;

/// [`LedgerGateway`] speaking JSON-RPC 2.0 to a wallet-backed Ethereum node.
///
/// Writes go through `eth_sendTransaction`, so signing (and any refusal to
/// sign) happens in the wallet behind the endpoint.
pub struct JsonRpcLedger {
    client: Client,
    rpc_url: String,
    contract: Address,
    wallet: Option<Address>,
    receipt_poll: Duration,
    /// Zero returns as soon as the transaction is accepted.
    receipt_timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcReply {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct Receipt {
    status: Option<String>,
}

impl JsonRpcLedger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let contract = parse_address(&config.contract_address)?;
        let wallet = config
            .wallet_address
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .map(parse_address)
            .transpose()?;
        let client = Client::builder()
            .user_agent(format!("parkpay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            contract,
            wallet,
            receipt_poll: Duration::from_millis(config.receipt_poll_ms.max(1)),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        debug!(id, "rpc: {method}");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let status = response.status();
        // Nodes may put a JSON-RPC error in a non-2xx body, so parse first.
        let reply = match response.json::<RpcReply>().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(LedgerError::Transport(format!("RPC endpoint returned {status}")));
            }
            Err(e) => return Err(LedgerError::Decode(e.to_string())),
        };

        if let Some(error) = reply.error {
            return Err(match error.code {
                USER_REJECTED => LedgerError::UserRejected,
                code => LedgerError::Rpc {
                    code,
                    message: error.message,
                },
            });
        }
        serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn first_account(&self) -> Result<Option<Address>, LedgerError> {
        if let Some(wallet) = self.wallet {
            return Ok(Some(wallet));
        }
        let accounts: Vec<Address> = self.rpc("eth_accounts", json!([])).await?;
        Ok(accounts.into_iter().next())
    }

    async fn transact(&self, data: Vec<u8>) -> Result<String, LedgerError> {
        let from = self.first_account().await?.ok_or_else(|| LedgerError::Rpc {
            code: NO_ACCOUNT,
            message: "No wallet account connected".to_string(),
        })?;
        let tx = json!({
            "from": from,
            "to": self.contract,
            "data": format!("0x{}", hex::encode(data)),
        });
        let hash: H256 = self.rpc("eth_sendTransaction", json!([tx])).await?;
        let hash = format!("{hash:?}");
        info!(tx = %hash, "transaction submitted");

        if !self.receipt_timeout.is_zero() {
            self.await_receipt(&hash).await?;
        }
        Ok(hash)
    }

    /// Polls for the receipt of a submitted transaction. Only a revert is an
    /// error: the hash already exists, so poll failures and the deadline
    /// leave the payment submitted but unconfirmed.
    async fn await_receipt(&self, hash: &str) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            match self
                .rpc::<Option<Receipt>>("eth_getTransactionReceipt", json!([hash]))
                .await
            {
                Ok(Some(Receipt { status: Some(s) })) if s == "0x0" => {
                    return Err(LedgerError::Reverted(hash.to_string()));
                }
                Ok(Some(_)) => {
                    info!(tx = %hash, "transaction confirmed");
                    return Ok(());
                }
                Ok(None) => {}
                Err(err) => warn!(tx = %hash, "receipt poll failed: {err}"),
            }

            if Instant::now() >= deadline {
                warn!(
                    tx = %hash,
                    "no receipt after {}s, confirmation pending",
                    self.receipt_timeout.as_secs()
                );
                return Ok(());
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let call = json!({
            "to": self.contract,
            "data": format!("0x{}", hex::encode(data)),
        });
        let raw: String = self.rpc("eth_call", json!([call, "latest"])).await?;
        hex::decode(raw.trim_start_matches("0x")).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

fn parse_address(raw: &str) -> Result<Address, LedgerError> {
    raw.trim()
        .parse()
        .map_err(|_| LedgerError::Decode(format!("Invalid address: {raw}")))
}

#[async_trait]
impl LedgerGateway for JsonRpcLedger {
    async fn pay_fee(&self, vehicle_id: &str) -> Result<String, LedgerError> {
        let data = abi::encode_call(abi::PAY_FEE, &[Token::String(vehicle_id.to_string())]);
        self.transact(data).await
    }

    async fn register_vehicle(&self, registration: &Registration) -> Result<String, LedgerError> {
        let data = abi::encode_call(
            abi::REGISTER_VEHICLE,
            &[
                Token::String(registration.vehicle_number.clone()),
                Token::String(registration.user_name.clone()),
            ],
        );
        self.transact(data).await
    }

    async fn connected_account(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.first_account().await?.map(|a| format!("{a:?}")))
    }

    async fn vehicles(&self, owner: &str) -> Result<Vec<VehicleInfo>, LedgerError> {
        let owner = parse_address(owner)?;
        let data = abi::encode_call(abi::GET_VEHICLE_INFO, &[Token::Address(owner)]);
        abi::decode_vehicles(&self.call(data).await?)
    }

    async fn payment_history(&self, owner: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let owner = parse_address(owner)?;
        let data = abi::encode_call(abi::GET_PAYMENT_HISTORY, &[Token::Address(owner)]);
        abi::decode_payments(&self.call(data).await?)
    }
}
