use anchor_lang::prelude::*;
use derive_new::new;

use crate::instruction::ComputationKind;
use crate::{ARCIUM_CLOCK_ACCOUNT, ARCIUM_FEE_POOL_ACCOUNT, ARCIUM_PROGRAM_ID, DEFAULT_CLUSTER_OFFSET};

pub const MXE_ACCOUNT_SEED: &[u8] = b"MXEAccount";
pub const MEMPOOL_SEED: &[u8] = b"Mempool";
pub const EXECPOOL_SEED: &[u8] = b"Execpool";
pub const COMPUTATION_SEED: &[u8] = b"ComputationAccount";
pub const COMP_DEF_SEED: &[u8] = b"ComputationDefinitionAccount";
pub const CLUSTER_SEED: &[u8] = b"Cluster";

/// Identifies one MXE deployment: the program that queues computations, the executor
/// program that owns every derived account, and the cluster the jobs run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, new)]
pub struct Programs {
    pub mxe_program: Pubkey,
    pub arcium_program: Pubkey,
    pub cluster_offset: u32,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            mxe_program: crate::ID,
            arcium_program: ARCIUM_PROGRAM_ID,
            cluster_offset: DEFAULT_CLUSTER_OFFSET,
        }
    }
}

impl Programs {
    pub fn mxe_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[MXE_ACCOUNT_SEED, self.mxe_program.as_ref()],
            &self.arcium_program,
        )
    }

    pub fn mempool_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[MEMPOOL_SEED, self.mxe_program.as_ref()],
            &self.arcium_program,
        )
    }

    pub fn execpool_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[EXECPOOL_SEED, self.mxe_program.as_ref()],
            &self.arcium_program,
        )
    }

    pub fn computation_pda(&self, computation_offset: u64) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[
                COMPUTATION_SEED,
                self.mxe_program.as_ref(),
                &computation_offset.to_le_bytes(),
            ],
            &self.arcium_program,
        )
    }

    pub fn comp_def_pda(&self, comp_def_offset: u32) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[
                COMP_DEF_SEED,
                self.mxe_program.as_ref(),
                &comp_def_offset.to_le_bytes(),
            ],
            &self.arcium_program,
        )
    }

    pub fn cluster_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[CLUSTER_SEED, &self.cluster_offset.to_le_bytes()],
            &self.arcium_program,
        )
    }
}

/// Every account a queue-computation instruction touches besides the payer and the
/// two programs. Only `computation` depends on the per-attempt offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputationAccounts {
    pub mxe: Pubkey,
    pub mempool: Pubkey,
    pub executing_pool: Pubkey,
    pub computation: Pubkey,
    pub comp_def: Pubkey,
    pub cluster: Pubkey,
    pub fee_pool: Pubkey,
    pub clock: Pubkey,
}

impl ComputationAccounts {
    pub fn derive(programs: &Programs, kind: ComputationKind, computation_offset: u64) -> Self {
        Self {
            mxe: programs.mxe_pda().0,
            mempool: programs.mempool_pda().0,
            executing_pool: programs.execpool_pda().0,
            computation: programs.computation_pda(computation_offset).0,
            comp_def: programs.comp_def_pda(kind.comp_def_offset()).0,
            cluster: programs.cluster_pda().0,
            fee_pool: ARCIUM_FEE_POOL_ACCOUNT,
            clock: ARCIUM_CLOCK_ACCOUNT,
        }
    }
}
