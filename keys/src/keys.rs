//! Instruction key compilation.

use {
    solana_instruction::{AccountMeta, Instruction},
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyMapError {
    /// A key required to sign was not among the provided keypairs.
    #[error("Missing required signer: {0}")]
    MissingSigner(Pubkey),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct KeyMeta {
    is_signer: bool,
    is_writable: bool,
    is_program: bool,
}

/// The set of keys referenced by a chain of instructions, in first-seen
/// order, with signer and writable flags merged across all references.
///
/// The fee payer, when given, is always the first key and always a
/// writable signer.
#[derive(Clone, Debug, Default)]
pub struct KeyMap {
    keys: Vec<(Pubkey, KeyMeta)>,
}

impl KeyMap {
    pub fn compile_from_instruction(instruction: &Instruction) -> Self {
        Self::compile_from_instructions(std::iter::once(instruction))
    }

    pub fn compile_from_instructions<'a>(
        instructions: impl IntoIterator<Item = &'a Instruction>,
    ) -> Self {
        let mut key_map = Self::default();
        for instruction in instructions {
            key_map.add_program(instruction.program_id);
            instruction
                .accounts
                .iter()
                .for_each(|meta| key_map.add_account(meta));
        }
        key_map
    }

    pub fn compile_with_payer<'a>(
        payer: &Pubkey,
        instructions: impl IntoIterator<Item = &'a Instruction>,
    ) -> Self {
        let mut key_map = Self::default();
        key_map.add_account(&AccountMeta::new(*payer, true));
        for instruction in instructions {
            key_map.add_program(instruction.program_id);
            instruction
                .accounts
                .iter()
                .for_each(|meta| key_map.add_account(meta));
        }
        key_map
    }

    fn entry(&mut self, pubkey: Pubkey) -> &mut KeyMeta {
        let index = match self.position(&pubkey) {
            Some(index) => index,
            None => {
                self.keys.push((pubkey, KeyMeta::default()));
                self.keys.len() - 1
            }
        };
        &mut self.keys[index].1
    }

    pub fn add_account(&mut self, meta: &AccountMeta) {
        let entry = self.entry(meta.pubkey);
        entry.is_signer |= meta.is_signer;
        entry.is_writable |= meta.is_writable;
    }

    pub fn add_program(&mut self, program_id: Pubkey) {
        self.entry(program_id).is_program = true;
    }

    pub fn keys(&self) -> impl Iterator<Item = &Pubkey> {
        self.keys.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn position(&self, key: &Pubkey) -> Option<usize> {
        self.keys.iter().position(|(k, _)| k == key)
    }

    fn meta(&self, key: &Pubkey) -> Option<&KeyMeta> {
        self.keys.iter().find(|(k, _)| k == key).map(|(_, m)| m)
    }

    pub fn is_signer(&self, key: &Pubkey) -> bool {
        self.meta(key).is_some_and(|m| m.is_signer)
    }

    pub fn is_writable(&self, key: &Pubkey) -> bool {
        self.meta(key).is_some_and(|m| m.is_writable)
    }

    pub fn is_program(&self, key: &Pubkey) -> bool {
        self.meta(key).is_some_and(|m| m.is_program)
    }

    /// Keys that must sign, in key order.
    pub fn signers(&self) -> impl Iterator<Item = &Pubkey> {
        self.keys
            .iter()
            .filter(|(_, meta)| meta.is_signer)
            .map(|(key, _)| key)
    }

    /// Keys that will be written to, in key order.
    pub fn writable(&self) -> impl Iterator<Item = &Pubkey> {
        self.keys
            .iter()
            .filter(|(_, meta)| meta.is_writable)
            .map(|(key, _)| key)
    }

    /// Pick the keypairs this key map requires, in signer order.
    ///
    /// Keypairs the instructions don't need are dropped, since a
    /// transaction signed by an extraneous key is rejected. Duplicate
    /// keypairs are collapsed.
    pub fn select_signers<'a>(
        &self,
        keypairs: &[&'a Keypair],
    ) -> Result<Vec<&'a Keypair>, KeyMapError> {
        self.signers()
            .map(|signer| {
                keypairs
                    .iter()
                    .find(|keypair| keypair.pubkey() == *signer)
                    .copied()
                    .ok_or(KeyMapError::MissingSigner(*signer))
            })
            .collect()
    }

    /// Check that every required signer is present in `signed`.
    pub fn verify_signers(&self, signed: &[Pubkey]) -> Result<(), KeyMapError> {
        match self.signers().find(|signer| !signed.contains(signer)) {
            Some(missing) => Err(KeyMapError::MissingSigner(*missing)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_instruction(program_id: Pubkey, metas: Vec<AccountMeta>) -> Instruction {
        Instruction::new_with_bytes(program_id, &[], metas)
    }

    #[test]
    fn test_flags_merge_across_instructions() {
        let program_a = Pubkey::new_unique();
        let program_b = Pubkey::new_unique();
        let shared = Pubkey::new_unique();
        let other = Pubkey::new_unique();

        let instructions = [
            test_instruction(program_a, vec![AccountMeta::new_readonly(shared, false)]),
            test_instruction(
                program_b,
                vec![
                    AccountMeta::new(shared, true),
                    AccountMeta::new_readonly(other, false),
                ],
            ),
        ];
        let key_map = KeyMap::compile_from_instructions(instructions.iter());

        assert_eq!(key_map.len(), 4);
        assert!(key_map.is_signer(&shared));
        assert!(key_map.is_writable(&shared));
        assert!(!key_map.is_signer(&other));
        assert!(!key_map.is_writable(&other));
        assert!(key_map.is_program(&program_a));
        assert!(key_map.is_program(&program_b));
        assert_eq!(key_map.position(&program_a), Some(0));
    }

    #[test]
    fn test_payer_is_first_writable_signer() {
        let payer = Pubkey::new_unique();
        let program_id = Pubkey::new_unique();
        let account = Pubkey::new_unique();

        let instruction = test_instruction(program_id, vec![AccountMeta::new(account, false)]);
        let key_map = KeyMap::compile_with_payer(&payer, [&instruction]);

        assert_eq!(key_map.position(&payer), Some(0));
        assert!(key_map.is_signer(&payer));
        assert!(key_map.is_writable(&payer));
        assert_eq!(key_map.signers().collect::<Vec<_>>(), vec![&payer]);
    }

    #[test]
    fn test_select_signers_drops_extraneous_keypairs() {
        let payer = Keypair::new();
        let message = Keypair::new();
        let unused = Keypair::new();
        let program_id = Pubkey::new_unique();

        let instruction = test_instruction(
            program_id,
            vec![
                AccountMeta::new(payer.pubkey(), true),
                AccountMeta::new(message.pubkey(), true),
            ],
        );
        let key_map = KeyMap::compile_with_payer(&payer.pubkey(), [&instruction]);

        let selected = key_map
            .select_signers(&[&unused, &message, &payer])
            .unwrap();
        let selected: Vec<Pubkey> = selected.iter().map(|k| k.pubkey()).collect();
        assert_eq!(selected, vec![payer.pubkey(), message.pubkey()]);
    }

    #[test]
    fn test_select_signers_missing() {
        let payer = Keypair::new();
        let message = Keypair::new();
        let program_id = Pubkey::new_unique();

        let instruction =
            test_instruction(program_id, vec![AccountMeta::new(message.pubkey(), true)]);
        let key_map = KeyMap::compile_with_payer(&payer.pubkey(), [&instruction]);

        assert_eq!(
            key_map.select_signers(&[&payer]).unwrap_err(),
            KeyMapError::MissingSigner(message.pubkey())
        );
        assert_eq!(
            key_map.verify_signers(&[payer.pubkey()]),
            Err(KeyMapError::MissingSigner(message.pubkey()))
        );
        assert!(key_map
            .verify_signers(&[payer.pubkey(), message.pubkey()])
            .is_ok());
    }
}
