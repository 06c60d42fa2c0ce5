//! Builds the candidate and reference instruction sequences for one
//! logical bridge operation.

use {
    crate::fixtures::{Deployment, DeploymentPair},
    fork_harness_error::{HarnessError, Side},
    fork_harness_keys::KeypairFactory,
    fork_harness_programs_token::token,
    fork_harness_programs_token_bridge::instruction::{
        approve_transfer_authority, legacy_transfer_tokens_native,
        legacy_transfer_tokens_with_payload_native, TransferArgs, TransferNativeAccounts,
        TransferWithPayloadArgs,
    },
    log::debug,
    solana_instruction::Instruction,
    solana_keypair::Keypair,
    solana_message::Message,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
};

/// Largest serialized transaction the cluster accepts.
pub const PACKET_DATA_SIZE: usize = 1232;

const SIGNATURE_LEN: usize = 64;

/// The logical operation a scenario runs against both deployments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeOperation {
    TransferTokensWithPayloadNative(TransferWithPayloadArgs),
    TransferTokensNative(TransferArgs),
}

impl BridgeOperation {
    pub fn amount(&self) -> u64 {
        match self {
            BridgeOperation::TransferTokensWithPayloadNative(args) => args.amount,
            BridgeOperation::TransferTokensNative(args) => args.amount,
        }
    }

    pub fn nonce(&self) -> u32 {
        match self {
            BridgeOperation::TransferTokensWithPayloadNative(args) => args.nonce,
            BridgeOperation::TransferTokensNative(args) => args.nonce,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeOperation::TransferTokensWithPayloadNative(_) => {
                "transfer_tokens_with_payload_native"
            }
            BridgeOperation::TransferTokensNative(_) => "transfer_tokens_native",
        }
    }
}

/// Accounts shared by both sides of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferAccounts {
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub src_token: Pubkey,
}

/// Whether the sender approves the transfer authority ahead of the
/// transfer. Omitting it revokes any delegation left on the source account
/// instead, so the transfer runs without an approval even when an earlier
/// truncated transfer left part of its allowance behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApprovePolicy {
    #[default]
    Include,
    Omit,
}

/// One side's transaction: an approve or a revoke followed by the transfer.
#[derive(Debug)]
pub struct InstructionSequence {
    pub side: Side,
    pub deployment: Deployment,
    pub message: Keypair,
    pub instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn message_address(&self) -> Pubkey {
        self.message.pubkey()
    }
}

#[derive(Debug)]
pub struct InstructionPair {
    pub candidate: InstructionSequence,
    pub reference: InstructionSequence,
}

impl InstructionPair {
    pub fn get(&self, side: Side) -> &InstructionSequence {
        match side {
            Side::Candidate => &self.candidate,
            Side::Reference => &self.reference,
        }
    }
}

/// Size of `instructions` as a signed transaction paid for by `payer`.
pub fn transaction_size(instructions: &[Instruction], payer: &Pubkey) -> usize {
    let message = Message::new(instructions, Some(payer));
    let signatures = message.header.num_required_signatures as usize;
    // Compact length prefix of the signature list; a single byte below 128.
    message.serialize().len() + 1 + SIGNATURE_LEN * signatures
}

fn build_sequence(
    side: Side,
    deployment: &Deployment,
    operation: &BridgeOperation,
    accounts: &TransferAccounts,
    sender_authority: &Pubkey,
    message: Keypair,
    approve: ApprovePolicy,
) -> Result<InstructionSequence, HarnessError> {
    let transfer_accounts = TransferNativeAccounts {
        payer: accounts.payer,
        mint: accounts.mint,
        src_token: accounts.src_token,
        core_message: message.pubkey(),
        core_bridge_program: deployment.core_bridge,
    };

    let delegation = match approve {
        ApprovePolicy::Include => approve_transfer_authority(
            &deployment.token_bridge,
            &accounts.src_token,
            &accounts.payer,
            operation.amount(),
        ),
        ApprovePolicy::Omit => token::revoke(&accounts.src_token, &accounts.payer),
    }
    .map_err(|err| HarnessError::Build {
        side,
        reason: err.to_string(),
    })?;

    let mut instructions = Vec::with_capacity(2);
    instructions.push(delegation);
    instructions.push(match operation {
        BridgeOperation::TransferTokensWithPayloadNative(args) => {
            legacy_transfer_tokens_with_payload_native(
                &deployment.token_bridge,
                &transfer_accounts,
                sender_authority,
                args,
            )
        }
        BridgeOperation::TransferTokensNative(args) => {
            legacy_transfer_tokens_native(&deployment.token_bridge, &transfer_accounts, args)
        }
    });

    let size = transaction_size(&instructions, &accounts.payer);
    if size > PACKET_DATA_SIZE {
        return Err(HarnessError::Build {
            side,
            reason: format!("transaction too large: {size} bytes (max: {PACKET_DATA_SIZE})"),
        });
    }
    debug!(
        "[{side}] Built {} with message account {} ({size} bytes)",
        operation.name(),
        message.pubkey()
    );

    Ok(InstructionSequence {
        side,
        deployment: *deployment,
        message,
        instructions,
    })
}

/// Build the same operation for both deployments.
///
/// Each side gets its own message keypair from `keys`, its own transfer
/// authority delegation and its own program ids. Everything else
/// (accounts, sender authority and arguments) is shared verbatim.
pub fn build_pair(
    deployments: &DeploymentPair,
    operation: &BridgeOperation,
    accounts: &TransferAccounts,
    sender_authority: &Pubkey,
    keys: &impl KeypairFactory,
    scenario: &str,
    approve: ApprovePolicy,
) -> Result<InstructionPair, HarnessError> {
    let build = |side: Side| {
        build_sequence(
            side,
            deployments.get(side),
            operation,
            accounts,
            sender_authority,
            keys.message_keypair(scenario, side),
            approve,
        )
    };
    let candidate = build(Side::Candidate)?;
    let reference = build(Side::Reference)?;
    Ok(InstructionPair {
        candidate,
        reference,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fixtures::{
            default_transfer_args, default_transfer_with_payload_args, DEFAULT_AMOUNT,
        },
        fork_harness_keys::{RandomKeypairs, SeededKeypairs},
        fork_harness_programs_token_bridge::{
            instruction::{CORE_MESSAGE_INDEX, SENDER_AUTHORITY_INDEX},
            pda,
        },
        spl_token_interface::instruction::TokenInstruction,
    };

    fn accounts() -> TransferAccounts {
        TransferAccounts {
            payer: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            src_token: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_pair_uses_each_sides_programs_and_message() {
        let deployments = DeploymentPair::default();
        let accounts = accounts();
        let sender_authority = Pubkey::new_unique();
        let operation = BridgeOperation::TransferTokensWithPayloadNative(
            default_transfer_with_payload_args(DEFAULT_AMOUNT),
        );

        let pair = build_pair(
            &deployments,
            &operation,
            &accounts,
            &sender_authority,
            &RandomKeypairs::new(),
            "pair",
            ApprovePolicy::Include,
        )
        .unwrap();

        assert_ne!(pair.candidate.message_address(), pair.reference.message_address());
        for side in Side::ALL {
            let sequence = pair.get(side);
            let deployment = deployments.get(side);
            assert_eq!(sequence.side, side);
            assert_eq!(sequence.instructions.len(), 2);

            let approve = &sequence.instructions[0];
            assert_eq!(approve.program_id, token::ID);
            assert_eq!(
                approve.accounts[1].pubkey,
                pda::transfer_authority(&deployment.token_bridge)
            );

            let transfer = &sequence.instructions[1];
            assert_eq!(transfer.program_id, deployment.token_bridge);
            assert_eq!(
                transfer.accounts[CORE_MESSAGE_INDEX].pubkey,
                sequence.message_address()
            );
            assert_eq!(
                transfer.accounts[SENDER_AUTHORITY_INDEX].pubkey,
                sender_authority
            );
            assert!(transfer
                .accounts
                .iter()
                .any(|meta| meta.pubkey == deployment.core_bridge));
        }
        assert_eq!(
            pair.candidate.instructions[1].data,
            pair.reference.instructions[1].data
        );
    }

    #[test]
    fn test_omitted_approve_revokes_instead() {
        let accounts = accounts();
        let pair = build_pair(
            &DeploymentPair::default(),
            &BridgeOperation::TransferTokensNative(default_transfer_args(DEFAULT_AMOUNT)),
            &accounts,
            &Pubkey::new_unique(),
            &SeededKeypairs::new([7; 32]),
            "omit",
            ApprovePolicy::Omit,
        )
        .unwrap();

        for side in Side::ALL {
            let instructions = &pair.get(side).instructions;
            assert_eq!(instructions.len(), 2);
            assert_eq!(instructions[0].program_id, token::ID);
            assert_eq!(
                TokenInstruction::unpack(&instructions[0].data).unwrap(),
                TokenInstruction::Revoke
            );
            assert_eq!(instructions[0].accounts[0].pubkey, accounts.src_token);
            assert_eq!(instructions[0].accounts[1].pubkey, accounts.payer);
            assert_eq!(instructions[1].program_id, pair.get(side).deployment.token_bridge);
        }
        assert_eq!(
            pair.reference.instructions[1].program_id,
            Deployment::REFERENCE.token_bridge
        );
    }

    #[test]
    fn test_oversized_payload_fails_to_build() {
        let mut args = default_transfer_with_payload_args(DEFAULT_AMOUNT);
        args.payload = vec![0xab; 1_000];

        let err = build_pair(
            &DeploymentPair::default(),
            &BridgeOperation::TransferTokensWithPayloadNative(args),
            &accounts(),
            &Pubkey::new_unique(),
            &RandomKeypairs::new(),
            "oversized",
            ApprovePolicy::Include,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Build {
                side: Side::Candidate,
                ..
            }
        ));
    }

    #[test]
    fn test_default_transaction_fits() {
        let accounts = accounts();
        let pair = build_pair(
            &DeploymentPair::default(),
            &BridgeOperation::TransferTokensWithPayloadNative(default_transfer_with_payload_args(
                DEFAULT_AMOUNT,
            )),
            &accounts,
            &Pubkey::new_unique(),
            &RandomKeypairs::new(),
            "fits",
            ApprovePolicy::Include,
        )
        .unwrap();

        let size = transaction_size(&pair.candidate.instructions, &accounts.payer);
        assert!(size <= PACKET_DATA_SIZE, "{size}");
    }
}
