//! In-memory ICRC-1/ICRC-2 ledger

use donation_client::principal::{Account, Principal};
use donation_client::types::{
    Allowance, AllowanceArgs, ApproveArgs, ApproveError, TransferArgs, TransferError,
    TransferFromArgs, TransferFromError,
};
use std::collections::HashMap;

type AccountKey = (Principal, [u8; 32]);

fn key(account: &Account) -> AccountKey {
    (account.owner, account.effective_subaccount())
}

#[derive(Debug, Clone, Copy)]
struct Approval {
    amount: u64,
    expires_at: Option<u64>,
}

impl Approval {
    fn remaining(&self, now: u64) -> u64 {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => 0,
            _ => self.amount,
        }
    }
}

pub struct MockTokenLedger {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: u64,
    pub minting_account: Option<Account>,
    balances: HashMap<AccountKey, u64>,
    approvals: HashMap<(AccountKey, AccountKey), Approval>,
    next_block: u64,
}

impl Default for MockTokenLedger {
    fn default() -> Self {
        Self {
            name: "ckUSDT".to_string(),
            symbol: "ckUSDT".to_string(),
            decimals: 6,
            fee: 0,
            minting_account: None,
            balances: HashMap::new(),
            approvals: HashMap::new(),
            next_block: 0,
        }
    }
}

impl MockTokenLedger {
    pub fn total_supply(&self) -> u64 {
        self.balances.values().sum()
    }

    pub fn balance_of(&self, account: &Account) -> u64 {
        self.balances.get(&key(account)).copied().unwrap_or(0)
    }

    /// Credit an account out of thin air
    pub fn mint(&mut self, account: &Account, amount: u64) -> u64 {
        *self.balances.entry(key(account)).or_default() += amount;
        self.block()
    }

    pub fn allowance(&self, args: &AllowanceArgs, now: u64) -> Allowance {
        match self.approvals.get(&(key(&args.account), key(&args.spender))) {
            Some(approval) => Allowance {
                allowance: approval.remaining(now),
                expires_at: approval.expires_at,
            },
            None => Allowance::default(),
        }
    }

    pub fn transfer(&mut self, caller: Principal, args: &TransferArgs) -> Result<u64, TransferError> {
        if let Some(fee) = args.fee {
            if fee != self.fee {
                return Err(TransferError::BadFee {
                    expected_fee: self.fee,
                });
            }
        }
        let from = Account::new(caller, args.from_subaccount);
        let needed = args.amount.saturating_add(self.fee);
        let balance = self.balance_of(&from);
        if balance < needed {
            return Err(TransferError::InsufficientFunds { balance });
        }
        self.debit(&from, needed);
        *self.balances.entry(key(&args.to)).or_default() += args.amount;
        Ok(self.block())
    }

    pub fn approve(
        &mut self,
        caller: Principal,
        args: &ApproveArgs,
        now: u64,
    ) -> Result<u64, ApproveError> {
        if let Some(fee) = args.fee {
            if fee != self.fee {
                return Err(ApproveError::BadFee {
                    expected_fee: self.fee,
                });
            }
        }
        if let Some(expires_at) = args.expires_at {
            if expires_at <= now {
                return Err(ApproveError::Expired { ledger_time: now });
            }
        }
        let from = Account::new(caller, args.from_subaccount);
        let pair = (key(&from), key(&args.spender));
        let current = self
            .approvals
            .get(&pair)
            .map_or(0, |approval| approval.remaining(now));
        if let Some(expected) = args.expected_allowance {
            if expected != current {
                return Err(ApproveError::AllowanceChanged {
                    current_allowance: current,
                });
            }
        }
        let balance = self.balance_of(&from);
        if balance < self.fee {
            return Err(ApproveError::InsufficientFunds { balance });
        }

        self.debit(&from, self.fee);
        self.approvals.insert(
            pair,
            Approval {
                amount: args.amount,
                expires_at: args.expires_at,
            },
        );
        Ok(self.block())
    }

    /// `caller` is the spender
    pub fn transfer_from(
        &mut self,
        caller: Principal,
        args: &TransferFromArgs,
        now: u64,
    ) -> Result<u64, TransferFromError> {
        if let Some(fee) = args.fee {
            if fee != self.fee {
                return Err(TransferFromError::BadFee {
                    expected_fee: self.fee,
                });
            }
        }
        let spender = Account::new(caller, args.spender_subaccount);
        let pair = (key(&args.from), key(&spender));
        let needed = args.amount.saturating_add(self.fee);

        let allowance = self
            .approvals
            .get(&pair)
            .map_or(0, |approval| approval.remaining(now));
        if allowance < needed {
            return Err(TransferFromError::InsufficientAllowance { allowance });
        }
        let balance = self.balance_of(&args.from);
        if balance < needed {
            return Err(TransferFromError::InsufficientFunds { balance });
        }

        if let Some(approval) = self.approvals.get_mut(&pair) {
            approval.amount -= needed;
        }
        self.debit(&args.from, needed);
        *self.balances.entry(key(&args.to)).or_default() += args.amount;
        Ok(self.block())
    }

    fn debit(&mut self, account: &Account, amount: u64) {
        if let Some(balance) = self.balances.get_mut(&key(account)) {
            *balance -= amount;
        }
    }

    fn block(&mut self) -> u64 {
        let block = self.next_block;
        self.next_block += 1;
        block
    }
}
