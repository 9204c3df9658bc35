//! Contract capability analysis
//!
//! Detects dangerous capabilities from verified source when available,
//! otherwise from function selectors and byte patterns in deployed code.
//! Solana mints are read from the SPL mint account layout instead.

use std::collections::BTreeSet;

use crate::config::ContractAnalyzerConfig;
use crate::models::{
    ChainFamily, ContractSignals, FactorResult, FlagSeverity, FunctionFlag, OwnerStatus,
    RiskSignal, SourceInfo,
};

pub const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const SPL_TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Length of an SPL mint account without extensions
pub const SPL_MINT_LEN: usize = 82;

const PUSH4: u8 = 0x63;

/// balanceOf, transfer, approve, allowance, totalSupply, name, symbol, decimals
pub const ERC20_SELECTORS: [[u8; 4]; 8] = [
    [0x70, 0xa0, 0x82, 0x31],
    [0xa9, 0x05, 0x9c, 0xbb],
    [0x09, 0x5e, 0xa7, 0xb3],
    [0xdd, 0x62, 0xed, 0x3e],
    [0x18, 0x16, 0x0d, 0xdd],
    [0x06, 0xfd, 0xde, 0x03],
    [0x95, 0xd8, 0x9b, 0x41],
    [0x31, 0x3c, 0xe5, 0x67],
];

/// A contract creation with fewer ERC-20 selectors than this is not a token
pub const MIN_ERC20_SELECTORS: usize = 6;

/// owner(), getOwner()
const OWNER_GETTERS: [[u8; 4]; 2] = [[0x8d, 0xa5, 0xcb, 0x5b], [0x89, 0x3d, 0x20, 0xe8]];

/// Selector -> capability, keyed by the canonical signature
const SELECTOR_RULES: &[([u8; 4], FunctionFlag, &str)] = &[
    ([0x40, 0xc1, 0x0f, 0x19], FunctionFlag::Mint, "mint(address,uint256)"),
    ([0xa0, 0x71, 0x2d, 0x68], FunctionFlag::Mint, "mint(uint256)"),
    ([0x42, 0x96, 0x6c, 0x68], FunctionFlag::Burn, "burn(uint256)"),
    ([0x84, 0x56, 0xcb, 0x59], FunctionFlag::Pause, "pause()"),
    ([0x3f, 0x4b, 0xa8, 0x3a], FunctionFlag::Pause, "unpause()"),
    ([0xf9, 0xf9, 0x2b, 0xe4], FunctionFlag::Blacklist, "blacklist(address)"),
    ([0x44, 0x33, 0x7e, 0xa1], FunctionFlag::Blacklist, "addToBlacklist(address)"),
    ([0x15, 0x3b, 0x0d, 0x1e], FunctionFlag::Blacklist, "setBlacklist(address,bool)"),
    ([0x45, 0x5a, 0x43, 0x96], FunctionFlag::Blacklist, "blacklistAddress(address,bool)"),
    ([0xb5, 0x15, 0x56, 0x6a], FunctionFlag::Blacklist, "setBots(address[])"),
    ([0xd3, 0x46, 0x28, 0xcc], FunctionFlag::Blacklist, "addBots(address[])"),
    ([0x36, 0x59, 0xcf, 0xe6], FunctionFlag::Proxy, "upgradeTo(address)"),
    ([0x4f, 0x1e, 0xf2, 0x86], FunctionFlag::Proxy, "upgradeToAndCall(address,bytes)"),
    ([0x5c, 0x60, 0xda, 0x1b], FunctionFlag::Proxy, "implementation()"),
    ([0x8a, 0x8c, 0x52, 0x3c], FunctionFlag::OwnerOnlyTransfer, "enableTrading()"),
    ([0xc9, 0x56, 0x7b, 0xf9], FunctionFlag::OwnerOnlyTransfer, "openTrading()"),
    ([0xc2, 0xe5, 0xec, 0x04], FunctionFlag::OwnerOnlyTransfer, "setTradingEnabled(bool)"),
    ([0xec, 0x28, 0x43, 0x8a], FunctionFlag::OwnerOnlyTransfer, "setMaxTxAmount(uint256)"),
    ([0x8b, 0x4c, 0xee, 0x08], FunctionFlag::OwnerOnlyTransfer, "setSellFee(uint256)"),
    ([0x0b, 0x78, 0xf9, 0xc0], FunctionFlag::OwnerOnlyTransfer, "setFees(uint256,uint256)"),
];

/// DELEGATECALL forwarding prologues: EIP-1167 minimal proxy and two common clones
const PROXY_PATTERNS: [&[u8]; 3] = [
    &[0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73],
    &[0x36, 0x60, 0x00, 0x80, 0x37],
    &[0x36, 0x10, 0x3d, 0x60, 0x1c],
];

/// Byte sequences seen in sell-blocking tokens
const HONEYPOT_PATTERNS: [&[u8]; 2] = [
    &[0x8d, 0xa5, 0xcb, 0x5b, 0x00, 0x00, 0x00, 0x00],
    &[0x63, 0x91, 0x3d, 0x29, 0x14],
];

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Whether the dispatcher pushes `selector`
pub fn bytecode_has_selector(code: &[u8], selector: [u8; 4]) -> bool {
    contains(code, &[PUSH4, selector[0], selector[1], selector[2], selector[3]])
}

pub fn count_erc20_selectors(code: &[u8]) -> usize {
    ERC20_SELECTORS
        .iter()
        .filter(|s| bytecode_has_selector(code, **s))
        .count()
}

/// Capabilities visible in deployed EVM bytecode
pub fn scan_bytecode(code: &[u8]) -> BTreeSet<FunctionFlag> {
    let mut flags: BTreeSet<FunctionFlag> = SELECTOR_RULES
        .iter()
        .filter(|(selector, _, _)| bytecode_has_selector(code, *selector))
        .map(|(_, flag, _)| *flag)
        .collect();

    if PROXY_PATTERNS.iter().any(|p| contains(code, p)) {
        flags.insert(FunctionFlag::Proxy);
    }
    if HONEYPOT_PATTERNS.iter().any(|p| contains(code, p)) {
        flags.insert(FunctionFlag::HoneypotPattern);
    }
    flags
}

/// Findings from verified Solidity source
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceFindings {
    pub flags: BTreeSet<FunctionFlag>,
    pub self_destruct: bool,
    /// Owner-gated functions with no way to renounce
    pub owner_gated_without_renounce: bool,
}

pub fn scan_source(source: &str) -> SourceFindings {
    let code = source.to_ascii_lowercase();
    let mut findings = SourceFindings::default();

    let rules: [(&[&str], FunctionFlag); 6] = [
        (&["function mint"], FunctionFlag::Mint),
        (&["function burn"], FunctionFlag::Burn),
        (&["function pause", "whennotpaused"], FunctionFlag::Pause),
        (&["blacklist", "isbot", "bots["], FunctionFlag::Blacklist),
        (&["delegatecall"], FunctionFlag::Proxy),
        (
            &["tradingopen", "tradingenabled", "function enabletrading", "function setfee", "function settax", "maxtxamount"],
            FunctionFlag::OwnerOnlyTransfer,
        ),
    ];
    for (needles, flag) in rules {
        if needles.iter().any(|n| code.contains(n)) {
            findings.flags.insert(flag);
        }
    }

    findings.self_destruct = code.contains("selfdestruct") || code.contains("suicide(");
    findings.owner_gated_without_renounce =
        code.contains("onlyowner") && !code.contains("renounceownership");
    findings
}

/// Decoded SPL mint account
#[derive(Debug, Clone, PartialEq)]
pub struct SplMint {
    pub mint_authority: Option<String>,
    pub supply: u64,
    pub decimals: u8,
    pub freeze_authority: Option<String>,
    /// Token-2022 mint carrying extensions
    pub has_extensions: bool,
}

fn parse_optional_pubkey(data: &[u8]) -> Option<String> {
    let tag = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
    if tag == 0 {
        return None;
    }
    let key: [u8; 32] = data.get(4..36)?.try_into().ok()?;
    Some(solana_sdk::pubkey::Pubkey::new_from_array(key).to_string())
}

/// Parse the SPL mint layout:
/// mint_authority COption<Pubkey> (36) | supply u64 (8) | decimals u8 (1) |
/// is_initialized bool (1) | freeze_authority COption<Pubkey> (36)
pub fn parse_spl_mint(data: &[u8]) -> Option<SplMint> {
    if data.len() < SPL_MINT_LEN {
        return None;
    }
    Some(SplMint {
        mint_authority: parse_optional_pubkey(&data[0..36]),
        supply: u64::from_le_bytes(data[36..44].try_into().ok()?),
        decimals: data[44],
        freeze_authority: parse_optional_pubkey(&data[46..82]),
        has_extensions: data.len() > SPL_MINT_LEN,
    })
}

/// Derive contract signals from fetched evidence
pub fn detect_signals(
    family: ChainFamily,
    code: &[u8],
    source: Option<&SourceInfo>,
    owner: &OwnerStatus,
) -> ContractSignals {
    let mut signals = ContractSignals {
        is_verified: source.map_or(false, |s| s.verified),
        source_available: source.map_or(false, |s| s.source_code.is_some()),
        bytecode_size: code.len(),
        ..Default::default()
    };

    match family {
        ChainFamily::Evm => {
            signals.detected_functions = scan_bytecode(code);
            let mut owner_gated_without_renounce = false;
            if let Some(info) = source {
                if let Some(text) = &info.source_code {
                    let findings = scan_source(text);
                    signals.detected_functions.extend(findings.flags);
                    signals.self_destruct = findings.self_destruct;
                    owner_gated_without_renounce = findings.owner_gated_without_renounce;
                }
                if info.proxy {
                    signals.detected_functions.insert(FunctionFlag::Proxy);
                }
            }

            signals.ownership_renounced = match owner {
                OwnerStatus::Renounced => true,
                OwnerStatus::Owned(_) => false,
                // No readable owner: renounced only if nothing is owner-gated
                OwnerStatus::Unknown => {
                    !OWNER_GETTERS.iter().any(|s| bytecode_has_selector(code, *s))
                        && !owner_gated_without_renounce
                }
            };
        }
        ChainFamily::Solana => {
            if let Some(mint) = parse_spl_mint(code) {
                if mint.mint_authority.is_some() {
                    signals.detected_functions.insert(FunctionFlag::Mint);
                }
                if mint.freeze_authority.is_some() {
                    signals.detected_functions.insert(FunctionFlag::Blacklist);
                }
                if mint.has_extensions {
                    signals
                        .notes
                        .push("token-2022 mint with extensions".to_string());
                }
                signals.ownership_renounced =
                    mint.mint_authority.is_none() && mint.freeze_authority.is_none();
            } else {
                signals.ownership_renounced = matches!(owner, OwnerStatus::Renounced);
            }
        }
    }

    signals
}

/// Score contract signals
pub fn score_contract(signals: &ContractSignals, config: &ContractAnalyzerConfig) -> FactorResult {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if signals.is_verified {
        score -= config.verified_reduction;
        reasons.push("verified source published".to_string());
    } else {
        reasons.push("contract source not verified".to_string());
    }

    let mut critical = 0.0;
    for flag in &signals.detected_functions {
        match flag.severity() {
            FlagSeverity::Critical => critical += config.critical_flag_penalty,
            FlagSeverity::High => score += config.high_flag_penalty,
            FlagSeverity::Elevated => score += config.elevated_flag_penalty,
            FlagSeverity::Informational => {}
        }
        reasons.push(format!("{}: {}", flag, flag.describe()));
    }
    if signals.self_destruct {
        critical += config.critical_flag_penalty;
        reasons.push("contract can self-destruct".to_string());
    }
    score += critical.min(config.critical_flag_cap);

    if signals.detected_functions.is_empty() {
        reasons.push("no dangerous functions detected".to_string());
    }

    if signals.ownership_renounced {
        reasons.push("ownership renounced".to_string());
    } else {
        score += config.not_renounced_penalty;
        reasons.push("ownership not renounced".to_string());
    }

    if signals.bytecode_size > config.large_bytecode_bytes {
        score += config.large_bytecode_penalty;
        reasons.push(format!(
            "unusually large contract ({} bytes)",
            signals.bytecode_size
        ));
    }

    reasons.extend(signals.notes.iter().cloned());

    let mut result = FactorResult::scored(score, reasons);
    if signals.has(FunctionFlag::HoneypotPattern) {
        result = result.with_signal(RiskSignal::HoneypotPattern);
    }
    if signals.has(FunctionFlag::Mint) && !signals.ownership_renounced {
        result = result.with_signal(RiskSignal::RetainedMint);
    }
    result
}
