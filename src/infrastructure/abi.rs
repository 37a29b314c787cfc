//! ABI encoding of the parking-fee contract calls and normalization of the
//! tuples it returns.

use crate::domain::vehicle::{PaymentRecord, VehicleInfo};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::U256;
use ethers_core::utils::keccak256;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const PAY_FEE: &str = "payFee(string)";
pub const REGISTER_VEHICLE: &str = "registerVehicle(string,string)";
pub const GET_VEHICLE_INFO: &str = "getVehicleInfo(address)";
pub const GET_PAYMENT_HISTORY: &str = "getPaymentHistory(address)";

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = keccak256(signature.as_bytes())[..4].to_vec();
    data.extend(abi::encode(args));
    data
}

/// `(string vehicleNumber, string userName, address walletAddress,
/// uint256 parkingHours, uint256 totalFee, uint256 violationFee)[]`
pub fn vehicle_list_type() -> ParamType {
    ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::String,
        ParamType::String,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
    ])))
}

/// `(string vehicleNumber, string userName, uint256 parkingHours,
/// uint256 amountPaid, uint256 violationFee, uint256 timestamp)[]`
pub fn payment_list_type() -> ParamType {
    ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::String,
        ParamType::String,
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
    ])))
}

pub fn decode_vehicles(data: &[u8]) -> Result<Vec<VehicleInfo>, LedgerError> {
    decode_list(data, vehicle_list_type())?
        .into_iter()
        .map(decode_vehicle)
        .collect()
}

pub fn decode_payments(data: &[u8]) -> Result<Vec<PaymentRecord>, LedgerError> {
    decode_list(data, payment_list_type())?
        .into_iter()
        .map(decode_payment)
        .collect()
}

fn decode_list(data: &[u8], kind: ParamType) -> Result<Vec<Token>, LedgerError> {
    // An account that never interacted with the contract may get empty data back.
    if data.is_empty() {
        return Ok(Vec::new());
    }
    abi::decode(&[kind], data)
        .map_err(|e| LedgerError::Decode(e.to_string()))?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| malformed("expected an array"))
}

fn decode_vehicle(token: Token) -> Result<VehicleInfo, LedgerError> {
    let [vehicle_number, user_name, wallet_address, parking_hours, total_fee, violation_fee] =
        fields(token)?;
    Ok(VehicleInfo {
        vehicle_number: string(vehicle_number)?,
        user_name: string(user_name)?,
        wallet_address: wallet_address
            .into_address()
            .map(|a| format!("{a:?}"))
            .ok_or_else(|| malformed("walletAddress"))?,
        parking_hours: small_uint(parking_hours)?,
        total_fee: amount(total_fee)?,
        violation_fee: amount(violation_fee)?,
    })
}

fn decode_payment(token: Token) -> Result<PaymentRecord, LedgerError> {
    let [vehicle_number, user_name, parking_hours, amount_paid, violation_fee, timestamp] =
        fields(token)?;
    let secs = i64::try_from(small_uint(timestamp)?).map_err(|_| malformed("timestamp"))?;
    Ok(PaymentRecord {
        vehicle_number: string(vehicle_number)?,
        user_name: string(user_name)?,
        parking_hours: small_uint(parking_hours)?,
        amount_paid: amount(amount_paid)?,
        violation_fee: amount(violation_fee)?,
        paid_at: DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| malformed("timestamp"))?,
    })
}

fn fields<const N: usize>(token: Token) -> Result<[Token; N], LedgerError> {
    token
        .into_tuple()
        .ok_or_else(|| malformed("expected a tuple"))?
        .try_into()
        .map_err(|_| malformed("unexpected tuple arity"))
}

fn string(token: Token) -> Result<String, LedgerError> {
    token.into_string().ok_or_else(|| malformed("expected a string"))
}

fn uint(token: Token) -> Result<U256, LedgerError> {
    token.into_uint().ok_or_else(|| malformed("expected a uint"))
}

fn small_uint(token: Token) -> Result<u64, LedgerError> {
    let value = uint(token)?;
    if value > U256::from(u64::MAX) {
        return Err(malformed("uint does not fit in 64 bits"));
    }
    Ok(value.as_u64())
}

fn amount(token: Token) -> Result<Decimal, LedgerError> {
    let value = uint(token)?;
    Decimal::from_str(&value.to_string()).map_err(|_| malformed("amount out of range"))
}

fn malformed(what: &str) -> LedgerError {
    LedgerError::Decode(what.to_string())
}
