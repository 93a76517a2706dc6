//! The target instruction table.
//!
//! Every instruction of the stack machine is listed here together with its
//! stack arity, the hard fork that introduced it and a classification used by
//! the dialect when deciding which instructions become builtins and which
//! names are reserved:
//!
//! - *low-level control flow* (jumps, jump destinations, subroutine
//!   instructions) and *low-level stack manipulation* (push/dup/swap) are
//!   never exposed as builtins — the middle end owns control flow and stack
//!   layout;
//! - *terminating* instructions end execution; calls to their builtins leave
//!   the current block with a `Terminated` exit.
//!
//! The table is the single source of truth: reserved-identifier construction
//! iterates it via [`strum::IntoEnumIterator`].

use bitflags::bitflags;
use strum::{EnumCount, EnumIter};

/// Hard forks of the target chain, ordered oldest to newest.
///
/// Instruction availability is monotone in this ordering; the dialect for a
/// given version only exposes instructions introduced at or before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum EvmVersion {
    /// Frontier/Homestead baseline instruction set.
    Homestead,
    /// EIP-150 gas repricing fork.
    TangerineWhistle,
    /// EIP-158 state clearing fork.
    SpuriousDragon,
    /// Adds `returndatasize`/`returndatacopy`, `staticcall`, `revert`.
    Byzantium,
    /// Adds bitwise shifts, `create2`, `extcodehash`.
    Constantinople,
    /// Constantinople without EIP-1283.
    Petersburg,
    /// Adds `chainid` and `selfbalance`.
    Istanbul,
    /// EIP-2929 access lists.
    Berlin,
    /// Adds `basefee`.
    London,
    /// The merge; renames `difficulty` to `prevrandao`.
    Paris,
    /// Adds `push0`.
    Shanghai,
    /// Adds transient storage, `mcopy` and blob opcodes.
    Cancun,
    /// Adds EIP-7702 account code semantics.
    Prague,
    /// Adds `clz`; first version with container-format support.
    Osaka,
}

impl EvmVersion {
    /// Most recent version known to this table.
    #[must_use]
    pub const fn latest() -> Self {
        EvmVersion::Osaka
    }

    /// Whether this version can host the structured container format whose
    /// revision is selected by the dialect's extension version.
    #[must_use]
    pub fn supports_container_format(self) -> bool {
        self >= EvmVersion::Osaka
    }
}

bitflags! {
    /// Classification bits for instructions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InstructionFlags: u8 {
        /// Jumps, jump destinations and subroutine instructions.
        const LOW_LEVEL_CONTROL_FLOW = 1 << 0;
        /// Push/dup/swap/exchange instructions.
        const LOW_LEVEL_STACK = 1 << 1;
        /// Execution does not continue after this instruction.
        const TERMINATING = 1 << 2;
        /// Only exists inside the structured container format.
        const CONTAINER_ONLY = 1 << 3;
        /// Removed by the structured container format.
        const LEGACY_ONLY = 1 << 4;
    }
}

/// Static description of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionInfo {
    /// Canonical lowercase mnemonic.
    pub name: &'static str,
    /// Stack slots consumed.
    pub inputs: u8,
    /// Stack slots produced.
    pub outputs: u8,
    /// First version providing the instruction.
    pub since: EvmVersion,
    /// Classification bits.
    pub flags: InstructionFlags,
}

macro_rules! instruction_table {
    ($(
        $variant:ident = ($name:literal, $inputs:literal, $outputs:literal, $since:ident $(, $($flag:ident)|+)?);
    )+) => {
        /// An instruction of the target stack machine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter)]
        #[allow(missing_docs)]
        pub enum Instruction {
            $($variant,)+
        }

        impl Instruction {
            /// Returns the static description of this instruction.
            #[must_use]
            pub const fn info(self) -> InstructionInfo {
                match self {
                    $(
                        Instruction::$variant => InstructionInfo {
                            name: $name,
                            inputs: $inputs,
                            outputs: $outputs,
                            since: EvmVersion::$since,
                            flags: InstructionFlags::empty()
                                $($(.union(InstructionFlags::$flag))+)?,
                        },
                    )+
                }
            }
        }
    };
}

instruction_table! {
    Stop = ("stop", 0, 0, Homestead, TERMINATING);
    Add = ("add", 2, 1, Homestead);
    Mul = ("mul", 2, 1, Homestead);
    Sub = ("sub", 2, 1, Homestead);
    Div = ("div", 2, 1, Homestead);
    SDiv = ("sdiv", 2, 1, Homestead);
    Mod = ("mod", 2, 1, Homestead);
    SMod = ("smod", 2, 1, Homestead);
    AddMod = ("addmod", 3, 1, Homestead);
    MulMod = ("mulmod", 3, 1, Homestead);
    Exp = ("exp", 2, 1, Homestead);
    SignExtend = ("signextend", 2, 1, Homestead);
    Lt = ("lt", 2, 1, Homestead);
    Gt = ("gt", 2, 1, Homestead);
    SLt = ("slt", 2, 1, Homestead);
    SGt = ("sgt", 2, 1, Homestead);
    Eq = ("eq", 2, 1, Homestead);
    IsZero = ("iszero", 1, 1, Homestead);
    And = ("and", 2, 1, Homestead);
    Or = ("or", 2, 1, Homestead);
    Xor = ("xor", 2, 1, Homestead);
    Not = ("not", 1, 1, Homestead);
    Byte = ("byte", 2, 1, Homestead);
    Shl = ("shl", 2, 1, Constantinople);
    Shr = ("shr", 2, 1, Constantinople);
    Sar = ("sar", 2, 1, Constantinople);
    Clz = ("clz", 1, 1, Osaka);
    Keccak256 = ("keccak256", 2, 1, Homestead);
    Address = ("address", 0, 1, Homestead);
    Balance = ("balance", 1, 1, Homestead);
    Origin = ("origin", 0, 1, Homestead);
    Caller = ("caller", 0, 1, Homestead);
    CallValue = ("callvalue", 0, 1, Homestead);
    CallDataLoad = ("calldataload", 1, 1, Homestead);
    CallDataSize = ("calldatasize", 0, 1, Homestead);
    CallDataCopy = ("calldatacopy", 3, 0, Homestead);
    CodeSize = ("codesize", 0, 1, Homestead, LEGACY_ONLY);
    CodeCopy = ("codecopy", 3, 0, Homestead, LEGACY_ONLY);
    GasPrice = ("gasprice", 0, 1, Homestead);
    ExtCodeSize = ("extcodesize", 1, 1, Homestead, LEGACY_ONLY);
    ExtCodeCopy = ("extcodecopy", 4, 0, Homestead, LEGACY_ONLY);
    ReturnDataSize = ("returndatasize", 0, 1, Byzantium);
    ReturnDataCopy = ("returndatacopy", 3, 0, Byzantium);
    ExtCodeHash = ("extcodehash", 1, 1, Constantinople, LEGACY_ONLY);
    BlockHash = ("blockhash", 1, 1, Homestead);
    CoinBase = ("coinbase", 0, 1, Homestead);
    Timestamp = ("timestamp", 0, 1, Homestead);
    Number = ("number", 0, 1, Homestead);
    Difficulty = ("difficulty", 0, 1, Homestead);
    PrevRandao = ("prevrandao", 0, 1, Paris);
    GasLimit = ("gaslimit", 0, 1, Homestead);
    ChainId = ("chainid", 0, 1, Istanbul);
    SelfBalance = ("selfbalance", 0, 1, Istanbul);
    BaseFee = ("basefee", 0, 1, London);
    BlobHash = ("blobhash", 1, 1, Cancun);
    BlobBaseFee = ("blobbasefee", 0, 1, Cancun);
    Pop = ("pop", 1, 0, Homestead);
    MLoad = ("mload", 1, 1, Homestead);
    MStore = ("mstore", 2, 0, Homestead);
    MStore8 = ("mstore8", 2, 0, Homestead);
    SLoad = ("sload", 1, 1, Homestead);
    SStore = ("sstore", 2, 0, Homestead);
    Jump = ("jump", 1, 0, Homestead, LOW_LEVEL_CONTROL_FLOW | LEGACY_ONLY);
    JumpI = ("jumpi", 2, 0, Homestead, LOW_LEVEL_CONTROL_FLOW | LEGACY_ONLY);
    Pc = ("pc", 0, 1, Homestead, LEGACY_ONLY);
    MSize = ("msize", 0, 1, Homestead);
    Gas = ("gas", 0, 1, Homestead, LEGACY_ONLY);
    JumpDest = ("jumpdest", 0, 0, Homestead, LOW_LEVEL_CONTROL_FLOW | LEGACY_ONLY);
    TLoad = ("tload", 1, 1, Cancun);
    TStore = ("tstore", 2, 0, Cancun);
    MCopy = ("mcopy", 3, 0, Cancun);
    Push0 = ("push0", 0, 1, Shanghai, LOW_LEVEL_STACK);
    Push1 = ("push1", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push2 = ("push2", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push3 = ("push3", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push4 = ("push4", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push5 = ("push5", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push6 = ("push6", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push7 = ("push7", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push8 = ("push8", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push9 = ("push9", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push10 = ("push10", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push11 = ("push11", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push12 = ("push12", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push13 = ("push13", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push14 = ("push14", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push15 = ("push15", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push16 = ("push16", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push17 = ("push17", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push18 = ("push18", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push19 = ("push19", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push20 = ("push20", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push21 = ("push21", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push22 = ("push22", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push23 = ("push23", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push24 = ("push24", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push25 = ("push25", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push26 = ("push26", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push27 = ("push27", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push28 = ("push28", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push29 = ("push29", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push30 = ("push30", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push31 = ("push31", 0, 1, Homestead, LOW_LEVEL_STACK);
    Push32 = ("push32", 0, 1, Homestead, LOW_LEVEL_STACK);
    Dup1 = ("dup1", 1, 2, Homestead, LOW_LEVEL_STACK);
    Dup2 = ("dup2", 2, 3, Homestead, LOW_LEVEL_STACK);
    Dup3 = ("dup3", 3, 4, Homestead, LOW_LEVEL_STACK);
    Dup4 = ("dup4", 4, 5, Homestead, LOW_LEVEL_STACK);
    Dup5 = ("dup5", 5, 6, Homestead, LOW_LEVEL_STACK);
    Dup6 = ("dup6", 6, 7, Homestead, LOW_LEVEL_STACK);
    Dup7 = ("dup7", 7, 8, Homestead, LOW_LEVEL_STACK);
    Dup8 = ("dup8", 8, 9, Homestead, LOW_LEVEL_STACK);
    Dup9 = ("dup9", 9, 10, Homestead, LOW_LEVEL_STACK);
    Dup10 = ("dup10", 10, 11, Homestead, LOW_LEVEL_STACK);
    Dup11 = ("dup11", 11, 12, Homestead, LOW_LEVEL_STACK);
    Dup12 = ("dup12", 12, 13, Homestead, LOW_LEVEL_STACK);
    Dup13 = ("dup13", 13, 14, Homestead, LOW_LEVEL_STACK);
    Dup14 = ("dup14", 14, 15, Homestead, LOW_LEVEL_STACK);
    Dup15 = ("dup15", 15, 16, Homestead, LOW_LEVEL_STACK);
    Dup16 = ("dup16", 16, 17, Homestead, LOW_LEVEL_STACK);
    Swap1 = ("swap1", 2, 2, Homestead, LOW_LEVEL_STACK);
    Swap2 = ("swap2", 3, 3, Homestead, LOW_LEVEL_STACK);
    Swap3 = ("swap3", 4, 4, Homestead, LOW_LEVEL_STACK);
    Swap4 = ("swap4", 5, 5, Homestead, LOW_LEVEL_STACK);
    Swap5 = ("swap5", 6, 6, Homestead, LOW_LEVEL_STACK);
    Swap6 = ("swap6", 7, 7, Homestead, LOW_LEVEL_STACK);
    Swap7 = ("swap7", 8, 8, Homestead, LOW_LEVEL_STACK);
    Swap8 = ("swap8", 9, 9, Homestead, LOW_LEVEL_STACK);
    Swap9 = ("swap9", 10, 10, Homestead, LOW_LEVEL_STACK);
    Swap10 = ("swap10", 11, 11, Homestead, LOW_LEVEL_STACK);
    Swap11 = ("swap11", 12, 12, Homestead, LOW_LEVEL_STACK);
    Swap12 = ("swap12", 13, 13, Homestead, LOW_LEVEL_STACK);
    Swap13 = ("swap13", 14, 14, Homestead, LOW_LEVEL_STACK);
    Swap14 = ("swap14", 15, 15, Homestead, LOW_LEVEL_STACK);
    Swap15 = ("swap15", 16, 16, Homestead, LOW_LEVEL_STACK);
    Swap16 = ("swap16", 17, 17, Homestead, LOW_LEVEL_STACK);
    Log0 = ("log0", 2, 0, Homestead);
    Log1 = ("log1", 3, 0, Homestead);
    Log2 = ("log2", 4, 0, Homestead);
    Log3 = ("log3", 5, 0, Homestead);
    Log4 = ("log4", 6, 0, Homestead);
    Create = ("create", 3, 1, Homestead, LEGACY_ONLY);
    Call = ("call", 7, 1, Homestead, LEGACY_ONLY);
    CallCode = ("callcode", 7, 1, Homestead, LEGACY_ONLY);
    Return = ("return", 2, 0, Homestead, TERMINATING);
    DelegateCall = ("delegatecall", 6, 1, Homestead, LEGACY_ONLY);
    Create2 = ("create2", 4, 1, Constantinople, LEGACY_ONLY);
    StaticCall = ("staticcall", 6, 1, Byzantium, LEGACY_ONLY);
    Revert = ("revert", 2, 0, Byzantium, TERMINATING);
    Invalid = ("invalid", 0, 0, Homestead, TERMINATING);
    SelfDestruct = ("selfdestruct", 1, 0, Homestead, TERMINATING | LEGACY_ONLY);
    RJump = ("rjump", 0, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    RJumpI = ("rjumpi", 1, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    RJumpV = ("rjumpv", 1, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    CallF = ("callf", 0, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    RetF = ("retf", 0, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    JumpF = ("jumpf", 0, 0, Osaka, LOW_LEVEL_CONTROL_FLOW | CONTAINER_ONLY);
    DupN = ("dupn", 0, 1, Osaka, LOW_LEVEL_STACK | CONTAINER_ONLY);
    SwapN = ("swapn", 0, 0, Osaka, LOW_LEVEL_STACK | CONTAINER_ONLY);
    Exchange = ("exchange", 0, 0, Osaka, LOW_LEVEL_STACK | CONTAINER_ONLY);
    EofCreate = ("eofcreate", 4, 1, Osaka, CONTAINER_ONLY);
    ReturnContract = ("returncontract", 2, 0, Osaka, TERMINATING | CONTAINER_ONLY);
    DataLoad = ("dataload", 1, 1, Osaka, CONTAINER_ONLY);
    DataLoadN = ("dataloadn", 0, 1, Osaka, CONTAINER_ONLY);
    ExtCall = ("extcall", 4, 1, Osaka, CONTAINER_ONLY);
    ExtDelegateCall = ("extdelegatecall", 3, 1, Osaka, CONTAINER_ONLY);
    ExtStaticCall = ("extstaticcall", 3, 1, Osaka, CONTAINER_ONLY);
}

impl Instruction {
    /// Canonical lowercase mnemonic.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.info().name
    }

    /// Whether the instruction exists for `(version, container revision)`.
    ///
    /// Availability is monotone in the version; container-only instructions
    /// additionally require an extension revision to be active and
    /// legacy-only instructions require its absence.
    #[must_use]
    pub fn is_available(self, version: EvmVersion, container: Option<u8>) -> bool {
        let info = self.info();
        if info.since > version {
            return false;
        }
        if container.is_some() {
            !info.flags.contains(InstructionFlags::LEGACY_ONLY)
        } else {
            !info.flags.contains(InstructionFlags::CONTAINER_ONLY)
        }
    }

    /// Jumps and jump destinations; never exposed as builtins.
    #[must_use]
    pub fn is_low_level_control_flow(self) -> bool {
        self.info()
            .flags
            .contains(InstructionFlags::LOW_LEVEL_CONTROL_FLOW)
    }

    /// Push/dup/swap family; never exposed as builtins.
    #[must_use]
    pub fn is_low_level_stack_manipulation(self) -> bool {
        self.info().flags.contains(InstructionFlags::LOW_LEVEL_STACK)
    }

    /// Whether execution stops after this instruction.
    #[must_use]
    pub fn terminates(self) -> bool {
        self.info().flags.contains(InstructionFlags::TERMINATING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_are_lowercase_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for instr in Instruction::iter() {
            let name = instr.name();
            assert_eq!(name, name.to_lowercase());
            assert!(seen.insert(name), "duplicate mnemonic {name}");
        }
    }

    #[test]
    fn test_availability_by_version() {
        assert!(Instruction::Add.is_available(EvmVersion::Homestead, None));
        assert!(!Instruction::Shl.is_available(EvmVersion::Byzantium, None));
        assert!(Instruction::Shl.is_available(EvmVersion::Constantinople, None));
        assert!(!Instruction::MCopy.is_available(EvmVersion::Shanghai, None));
        assert!(Instruction::MCopy.is_available(EvmVersion::Cancun, None));
    }

    #[test]
    fn test_container_gating() {
        // legacy jumps disappear inside the container format
        assert!(Instruction::Jump.is_available(EvmVersion::Osaka, None));
        assert!(!Instruction::Jump.is_available(EvmVersion::Osaka, Some(1)));
        // relative jumps only exist inside it
        assert!(!Instruction::RJump.is_available(EvmVersion::Osaka, None));
        assert!(Instruction::RJump.is_available(EvmVersion::Osaka, Some(1)));
    }

    #[test]
    fn test_classification() {
        assert!(Instruction::Jump.is_low_level_control_flow());
        assert!(Instruction::Swap16.is_low_level_stack_manipulation());
        assert!(Instruction::Revert.terminates());
        assert!(!Instruction::Add.terminates());
    }
}
