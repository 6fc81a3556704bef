use crate::basic::request::PaymentRequest;
use crate::core::connection::{FreshnessToken, SolConnection};
use crate::core::constants::MEMO_PROGRAM_ID;
use crate::core::device::DeviceClass;
use crate::error::{classify_client_error, PaymentError, Result};
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use thiserror::Error;
use tracing::{debug, warn};

/// Structural problems found by [`verify_transaction`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionDefect {
    #[error("transaction has no recent blockhash")]
    MissingBlockhash,

    #[error("transaction has no instructions")]
    NoInstructions,

    #[error("fee payer {actual:?} does not match signer {expected}")]
    FeePayerMismatch {
        expected: Pubkey,
        actual: Option<Pubkey>,
    },

    #[error("signer {0} is not a required signer of the transaction")]
    SignerNotRequired(Pubkey),

    #[error("signature for {0} is empty")]
    EmptySignature(Pubkey),

    #[error("signature for {0} does not verify")]
    BadSignature(Pubkey),
}

impl TransactionDefect {
    fn into_payment_error(self, device: DeviceClass) -> PaymentError {
        match self {
            TransactionDefect::EmptySignature(_) | TransactionDefect::BadSignature(_) => {
                PaymentError::SignatureVerificationFailed { device }
            },
            other => PaymentError::TransactionFailed(format!("malformed transaction: {other}")),
        }
    }
}

/// SPL memo instruction signed by `signer`.
pub fn memo_instruction(memo: &str, signer: &Pubkey) -> Instruction {
    Instruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: vec![AccountMeta::new_readonly(*signer, true)],
        data: memo.as_bytes().to_vec(),
    }
}

/// Value transfer for `request`, plus a memo unless `include_memo` is false.
///
/// The request's reference key is attached to the transfer as a read-only,
/// non-signer account so it shows up in the reference's signature history.
pub fn transfer_instructions(
    payer: &Pubkey,
    request: &PaymentRequest,
    include_memo: bool,
) -> Vec<Instruction> {
    let mut transfer = system_instruction::transfer(payer, request.recipient(), request.lamports());
    if let Some(reference) = request.reference() {
        transfer
            .accounts
            .push(AccountMeta::new_readonly(*reference, false));
    }

    let mut instructions = vec![transfer];
    if include_memo {
        if let Some(memo) = request.memo() {
            instructions.push(memo_instruction(memo, payer));
        }
    }
    instructions
}

/// Build an unsigned transfer with a blockhash fetched right now and `payer` as fee payer.
///
/// The memo is left out for mobile sessions to keep the transaction small.
pub async fn build_transfer(
    connection: &dyn SolConnection,
    payer: &Pubkey,
    request: &PaymentRequest,
    device: DeviceClass,
) -> Result<(Transaction, FreshnessToken)> {
    let token = connection
        .get_latest_blockhash(CommitmentLevel::Confirmed)
        .await
        .map_err(|e| classify_client_error(&e, device))?;

    let instructions = transfer_instructions(payer, request, !device.is_mobile());
    let message = Message::new_with_blockhash(&instructions, Some(payer), &token.blockhash);
    debug!(
        request_id = request.id(),
        blockhash = %token.blockhash,
        last_valid_block_height = token.last_valid_block_height,
        instructions = instructions.len(),
        "transfer constructed"
    );
    Ok((Transaction::new_unsigned(message), token))
}

/// Structural self-check run before submission.
pub fn verify_transaction(
    tx: &Transaction,
    signer: &Pubkey,
) -> std::result::Result<(), TransactionDefect> {
    if tx.message.recent_blockhash == Hash::default() {
        return Err(TransactionDefect::MissingBlockhash);
    }
    if tx.message.instructions.is_empty() {
        return Err(TransactionDefect::NoInstructions);
    }
    let fee_payer = tx.message.account_keys.first().copied();
    if fee_payer != Some(*signer) {
        return Err(TransactionDefect::FeePayerMismatch {
            expected: *signer,
            actual: fee_payer,
        });
    }

    let is_signed = tx.signatures.iter().any(|sig| *sig != Signature::default());
    if !is_signed {
        return Ok(());
    }

    let required = tx.message.header.num_required_signatures as usize;
    let index = tx
        .message
        .account_keys
        .iter()
        .take(required)
        .position(|key| key == signer)
        .ok_or(TransactionDefect::SignerNotRequired(*signer))?;
    let signature = tx
        .signatures
        .get(index)
        .ok_or(TransactionDefect::EmptySignature(*signer))?;
    if *signature == Signature::default() {
        return Err(TransactionDefect::EmptySignature(*signer));
    }
    if !signature.verify(signer.as_ref(), &tx.message_data()) {
        return Err(TransactionDefect::BadSignature(*signer));
    }
    Ok(())
}

/// Run [`verify_transaction`] with the device policy: strict on desktop,
/// log-and-continue on mobile.
pub fn enforce_transaction_check(
    tx: &Transaction,
    signer: &Pubkey,
    device: DeviceClass,
) -> Result<()> {
    match verify_transaction(tx, signer) {
        Ok(()) => Ok(()),
        Err(defect) if device.is_mobile() => {
            warn!(%defect, "transaction self-check failed, continuing on mobile");
            Ok(())
        },
        Err(defect) => Err(defect.into_payment_error(device)),
    }
}
