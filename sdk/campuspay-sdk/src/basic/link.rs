//! Payment links in the `solana:<recipient>?amount=..&reference=..&label=..` form.

use crate::basic::request::{PaymentKind, PaymentRequest, PaymentRequestBuilder};
use crate::config::PaymentConfig;
use crate::core::constants::PAYMENT_LINK_SCHEME;
use crate::error::{PaymentError, Result};
use crate::utils::{parse_address, parse_sol};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;
use url::Url;

/// Fields carried by a payment link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub recipient: Pubkey,
    pub amount: Option<Decimal>,
    pub reference: Option<Pubkey>,
    pub label: Option<String>,
    pub message: Option<String>,
    pub memo: Option<String>,
}

impl PaymentLink {
    pub fn encode(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(amount) = self.amount {
            query.append_pair("amount", &amount.normalize().to_string());
        }
        if let Some(reference) = &self.reference {
            query.append_pair("reference", &reference.to_string());
        }
        if let Some(label) = &self.label {
            query.append_pair("label", label);
        }
        if let Some(message) = &self.message {
            query.append_pair("message", message);
        }
        if let Some(memo) = &self.memo {
            query.append_pair("memo", memo);
        }
        let query = query.finish();

        if query.is_empty() {
            format!("{PAYMENT_LINK_SCHEME}:{}", self.recipient)
        } else {
            format!("{PAYMENT_LINK_SCHEME}:{}?{query}", self.recipient)
        }
    }

    pub fn decode(uri: &str) -> Result<Self> {
        let url = Url::parse(uri.trim())
            .map_err(|e| PaymentError::InvalidAddress(format!("malformed payment link: {e}")))?;
        if url.scheme() != PAYMENT_LINK_SCHEME {
            return Err(PaymentError::InvalidAddress(format!(
                "unsupported link scheme {:?}",
                url.scheme()
            )));
        }

        let mut link = PaymentLink {
            recipient: parse_address(url.path())?,
            amount: None,
            reference: None,
            label: None,
            message: None,
            memo: None,
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "amount" => {
                    let amount = parse_sol(&value)?;
                    if amount <= Decimal::ZERO {
                        return Err(PaymentError::InvalidAmount(format!(
                            "link amount {amount} must be positive"
                        )));
                    }
                    link.amount = Some(amount);
                },
                // Only the first reference is tracked.
                "reference" if link.reference.is_none() => {
                    link.reference = Some(parse_address(&value)?);
                },
                "label" => link.label = Some(value.into_owned()),
                "message" => link.message = Some(value.into_owned()),
                "memo" => link.memo = Some(value.into_owned()),
                "spl-token" => {
                    return Err(PaymentError::InvalidAddress(
                        "token transfers are not supported".to_string(),
                    ))
                },
                _ => {},
            }
        }

        Ok(link)
    }

    /// Turn a scanned link into a vendor request the paying session can execute.
    ///
    /// Links do not carry the request kind, so the vendor ceiling applies. Use
    /// [`Self::into_request_as`] for a link shared as a direct transfer.
    pub fn into_request(self, config: &PaymentConfig) -> Result<PaymentRequest> {
        self.into_request_as(PaymentKind::Vendor, config)
    }

    pub fn into_request_as(self, kind: PaymentKind, config: &PaymentConfig) -> Result<PaymentRequest> {
        let amount = self
            .amount
            .ok_or_else(|| PaymentError::InvalidAmount("link carries no amount".to_string()))?;

        let mut builder =
            PaymentRequestBuilder::new(self.recipient.to_string(), amount).with_kind(kind);
        if let Some(label) = self.label {
            builder = builder.with_label(label);
        }
        if let Some(message) = self.message {
            builder = builder.with_message(message);
        }
        if let Some(memo) = self.memo {
            builder = builder.with_memo(memo);
        }
        if let Some(reference) = self.reference {
            builder = builder.with_reference(reference);
        }
        builder.build(config)
    }
}

impl fmt::Display for PaymentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PaymentLink {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
