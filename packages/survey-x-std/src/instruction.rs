use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::system_program;
use derive_new::new;

use crate::account::{ComputationAccounts, Programs};
use crate::Bytes32;

pub const SUBMIT_RESPONSE_DISCRIMINATOR: [u8; 8] = [85, 190, 208, 119, 243, 52, 133, 90];
pub const CREATE_SURVEY_DISCRIMINATOR: [u8; 8] = [25, 36, 97, 69, 88, 88, 54, 222];

/// Encrypted instruction the MXE program queues for the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputationKind {
    CreateSurvey,
    SubmitResponse,
}

impl ComputationKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComputationKind::CreateSurvey => "create_survey",
            ComputationKind::SubmitResponse => "submit_response",
        }
    }

    pub fn discriminator(&self) -> [u8; 8] {
        match self {
            ComputationKind::CreateSurvey => CREATE_SURVEY_DISCRIMINATOR,
            ComputationKind::SubmitResponse => SUBMIT_RESPONSE_DISCRIMINATOR,
        }
    }

    pub fn comp_def_offset(&self) -> u32 {
        crate::comp_def_offset(self.name())
    }
}

/// Arguments of both queue-computation instructions, in program order.
///
/// `ciphertext` is the 32-byte slot the executor reads; it carries the sha256
/// commitment of the detached payload ciphertext.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq, new)]
pub struct QueueComputationArgs {
    pub computation_offset: u64,
    pub ciphertext: Bytes32,
    pub pub_key: Bytes32,
    pub nonce: u128,
}

impl QueueComputationArgs {
    pub fn data(&self, kind: ComputationKind) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + 8 + 32 + 32 + 16);
        data.extend_from_slice(&kind.discriminator());
        data.extend_from_slice(&self.computation_offset.to_le_bytes());
        data.extend_from_slice(self.ciphertext.as_ref());
        data.extend_from_slice(self.pub_key.as_ref());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data
    }
}

pub fn queue_computation_account_metas(
    payer: &Pubkey,
    accounts: &ComputationAccounts,
    programs: &Programs,
) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(accounts.mxe, false),
        AccountMeta::new(accounts.mempool, false),
        AccountMeta::new(accounts.executing_pool, false),
        AccountMeta::new(accounts.computation, false),
        AccountMeta::new_readonly(accounts.comp_def, false),
        AccountMeta::new(accounts.cluster, false),
        AccountMeta::new(accounts.fee_pool, false),
        AccountMeta::new_readonly(accounts.clock, false),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(programs.arcium_program, false),
    ]
}

pub fn queue_computation(
    programs: &Programs,
    kind: ComputationKind,
    payer: &Pubkey,
    args: &QueueComputationArgs,
) -> (Instruction, ComputationAccounts) {
    let accounts = ComputationAccounts::derive(programs, kind, args.computation_offset);
    let instruction = Instruction {
        program_id: programs.mxe_program,
        accounts: queue_computation_account_metas(payer, &accounts, programs),
        data: args.data(kind),
    };

    (instruction, accounts)
}
