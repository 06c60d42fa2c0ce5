//! The execution environment handed to model programs.

use {
    super::ProgramRegistry,
    fork_harness_keys::KeyMap,
    solana_account::Account,
    solana_instruction::{error::InstructionError, AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    std::collections::HashMap,
};

/// Outer instruction plus four levels of cross-program invocation.
const MAX_INVOKE_DEPTH: usize = 5;

/// Per-transaction compute budget reported in logs.
pub(crate) const COMPUTE_UNIT_LIMIT: u64 = 200_000;

/// Slot and wall-clock time seen by programs. Fixed unless warped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalClock {
    pub slot: u64,
    pub unix_timestamp: i64,
}

impl Default for LocalClock {
    fn default() -> Self {
        Self {
            slot: 1,
            unix_timestamp: 1_700_000_000,
        }
    }
}

/// The account meta at `index`, or `NotEnoughAccountKeys`.
pub fn account_meta(instruction: &Instruction, index: usize) -> Result<&AccountMeta, InstructionError> {
    instruction
        .accounts
        .get(index)
        .ok_or(InstructionError::NotEnoughAccountKeys)
}

pub fn require_signer(meta: &AccountMeta) -> Result<(), InstructionError> {
    if meta.is_signer {
        Ok(())
    } else {
        Err(InstructionError::MissingRequiredSignature)
    }
}

/// Fail with `InvalidSeeds` unless `meta` is the expected derived address.
pub fn require_key(meta: &AccountMeta, expected: &Pubkey) -> Result<(), InstructionError> {
    if &meta.pubkey == expected {
        Ok(())
    } else {
        Err(InstructionError::InvalidSeeds)
    }
}

/// Working state of one transaction. Nothing here reaches the account
/// store unless every instruction succeeds.
pub struct InvokeContext<'a> {
    programs: &'a ProgramRegistry,
    key_map: &'a KeyMap,
    accounts: &'a mut HashMap<Pubkey, Account>,
    logs: &'a mut Vec<String>,
    clock: LocalClock,
    depth: usize,
    compute_units: u64,
}

impl<'a> InvokeContext<'a> {
    pub(crate) fn new(
        programs: &'a ProgramRegistry,
        key_map: &'a KeyMap,
        accounts: &'a mut HashMap<Pubkey, Account>,
        logs: &'a mut Vec<String>,
        clock: LocalClock,
    ) -> Self {
        Self {
            programs,
            key_map,
            accounts,
            logs,
            clock,
            depth: 0,
            compute_units: 0,
        }
    }

    pub(crate) fn process_instruction(
        &mut self,
        instruction: &Instruction,
    ) -> Result<(), InstructionError> {
        self.invoke_frame(instruction)
    }

    fn invoke_frame(&mut self, instruction: &Instruction) -> Result<(), InstructionError> {
        let programs = self.programs;
        let program = programs
            .get(&instruction.program_id)
            .ok_or(InstructionError::UnsupportedProgramId)?;
        if self.depth >= MAX_INVOKE_DEPTH {
            return Err(InstructionError::CallDepth);
        }

        let program_id = instruction.program_id;
        let units_before = self.compute_units;
        self.depth += 1;
        self.logs
            .push(format!("Program {program_id} invoke [{}]", self.depth));

        let result = program.process(self, instruction);

        self.depth -= 1;
        let units = self.compute_units - units_before;
        self.logs.push(format!(
            "Program {program_id} consumed {units} of {COMPUTE_UNIT_LIMIT} compute units"
        ));
        match &result {
            Ok(()) => self.logs.push(format!("Program {program_id} success")),
            Err(err) => self.logs.push(format!("Program {program_id} failed: {err}")),
        }
        result
    }

    /// Invoke another program. `pda_signers` are addresses derived from the
    /// calling program that it signs for.
    ///
    /// Signer and writable privileges can only be passed down, never
    /// gained.
    pub fn invoke_signed(
        &mut self,
        instruction: &Instruction,
        pda_signers: &[Pubkey],
    ) -> Result<(), InstructionError> {
        for meta in &instruction.accounts {
            if !self.accounts.contains_key(&meta.pubkey) {
                return Err(InstructionError::MissingAccount);
            }
            if meta.is_signer
                && !self.key_map.is_signer(&meta.pubkey)
                && !pda_signers.contains(&meta.pubkey)
            {
                return Err(InstructionError::PrivilegeEscalation);
            }
            if meta.is_writable && !self.key_map.is_writable(&meta.pubkey) {
                return Err(InstructionError::PrivilegeEscalation);
            }
        }
        self.invoke_frame(instruction)
    }

    pub fn account(&self, key: &Pubkey) -> Result<&Account, InstructionError> {
        self.accounts.get(key).ok_or(InstructionError::MissingAccount)
    }

    /// Mutable access to an account the instruction marked writable.
    pub fn account_mut(&mut self, meta: &AccountMeta) -> Result<&mut Account, InstructionError> {
        if !meta.is_writable {
            return Err(InstructionError::ReadonlyDataModified);
        }
        self.accounts
            .get_mut(&meta.pubkey)
            .ok_or(InstructionError::MissingAccount)
    }

    /// Move `lamports` from a writable account, failing if it can't pay.
    pub fn debit_lamports(
        &mut self,
        meta: &AccountMeta,
        lamports: u64,
    ) -> Result<(), InstructionError> {
        let account = self.account_mut(meta)?;
        account.lamports = account
            .lamports
            .checked_sub(lamports)
            .ok_or(InstructionError::InsufficientFunds)?;
        Ok(())
    }

    pub fn msg(&mut self, message: impl AsRef<str>) {
        self.logs.push(format!("Program log: {}", message.as_ref()));
    }

    pub fn clock(&self) -> LocalClock {
        self.clock
    }

    pub fn consume(&mut self, units: u64) {
        self.compute_units = self.compute_units.saturating_add(units);
    }

    pub fn compute_units_consumed(&self) -> u64 {
        self.compute_units
    }
}

/// An account nobody has created yet.
pub fn is_uninitialized(account: &Account) -> bool {
    account.lamports == 0 && account.data.is_empty()
}
