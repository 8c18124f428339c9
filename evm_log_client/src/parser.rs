use crate::error::EvmClientError;
use crate::types::{to_quantity, GetLogsParams, RpcLog};
use history_core::{Address, EventKind, LogQuery, RawEvent};
use num_bigint::BigUint;

const WORD: usize = 32;

fn parse_error(message: impl Into<String>) -> EvmClientError {
    EvmClientError::ParseError {
        message: message.into(),
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a JSON-RPC hex quantity such as `"0x9dc8f0"`
pub fn parse_quantity(value: &str) -> Result<u64, EvmClientError> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Err(parse_error(format!("empty quantity '{}'", value)));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| parse_error(format!("bad quantity '{}': {}", value, e)))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, EvmClientError> {
    hex::decode(strip_hex_prefix(value))
        .map_err(|e| parse_error(format!("bad hex '{}': {}", value, e)))
}

fn topic_address(log: &RpcLog, position: usize) -> Result<Address, EvmClientError> {
    let topic = log
        .topics
        .get(position)
        .ok_or_else(|| parse_error(format!("missing topic {}", position)))?;
    let word = decode_hex(topic)?;
    Address::from_word(&word).ok_or_else(|| parse_error(format!("topic {} is not 32 bytes", position)))
}

fn data_word(data: &[u8], index: usize) -> Result<&[u8], EvmClientError> {
    data.get(index * WORD..(index + 1) * WORD)
        .ok_or_else(|| parse_error(format!("data too short for word {}", index)))
}

fn optional_quantity(value: &Option<String>, name: &str) -> Result<u64, EvmClientError> {
    match value {
        Some(v) => parse_quantity(v),
        None => Err(parse_error(format!("log is missing {}", name))),
    }
}

/// Decode a pool log of the given kind into a [`RawEvent`].
///
/// Supply: topics `[sig, reserve, onBehalfOf, referralCode]`, data `[user, amount]`.
/// Withdraw: topics `[sig, reserve, user, to]`, data `[amount]`.
pub fn decode_log(kind: EventKind, log: &RpcLog) -> Result<RawEvent, EvmClientError> {
    match log.topics.first() {
        Some(topic0) if topic0.eq_ignore_ascii_case(kind.topic0()) => {}
        Some(topic0) => {
            return Err(parse_error(format!(
                "topic0 {} is not a {} event",
                topic0,
                kind.event_name()
            )))
        }
        None => return Err(parse_error("anonymous log")),
    }

    let data = decode_hex(&log.data)?;
    let asset = topic_address(log, 1)?;

    let (account, counterparty, amount_word) = match kind {
        EventKind::Inbound => {
            let on_behalf_of = topic_address(log, 2)?;
            let user = Address::from_word(data_word(&data, 0)?)
                .ok_or_else(|| parse_error("bad user word"))?;
            (on_behalf_of, user, data_word(&data, 1)?)
        }
        EventKind::Outbound => {
            let user = topic_address(log, 2)?;
            let to = topic_address(log, 3)?;
            (user, to, data_word(&data, 0)?)
        }
    };

    let transaction_index = optional_quantity(&log.transaction_index, "transactionIndex")?;
    let log_index = optional_quantity(&log.log_index, "logIndex")?;

    Ok(RawEvent {
        kind,
        block_number: optional_quantity(&log.block_number, "blockNumber")?,
        transaction_index: u32::try_from(transaction_index)
            .map_err(|_| parse_error("transactionIndex out of range"))?,
        log_index: u32::try_from(log_index).map_err(|_| parse_error("logIndex out of range"))?,
        transaction_hash: log.transaction_hash.clone(),
        asset,
        account,
        counterparty: Some(counterparty),
        amount: BigUint::from_bytes_be(amount_word),
    })
}

/// `eth_getLogs` parameters for one bounded query
pub fn build_get_logs_params(query: &LogQuery) -> GetLogsParams {
    let mut topics: Vec<Option<String>> = vec![Some(query.kind.topic0().to_string()), None, None, None];
    for (field, value) in &query.constraints {
        if let Some(position) = query.kind.topic_position(*field) {
            topics[position] = Some(value.to_topic());
        }
    }
    while topics.last().is_some_and(Option::is_none) {
        topics.pop();
    }

    GetLogsParams {
        address: query.contract.to_string(),
        from_block: to_quantity(query.from_block),
        to_block: to_quantity(query.to_block),
        topics,
    }
}
