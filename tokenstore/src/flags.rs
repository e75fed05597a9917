// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! PKCS#11 token flag bits (`CKF_*`).

pub const CKF_RNG: u64 = 0x0000_0001;
pub const CKF_WRITE_PROTECTED: u64 = 0x0000_0002;
pub const CKF_LOGIN_REQUIRED: u64 = 0x0000_0004;
pub const CKF_USER_PIN_INITIALIZED: u64 = 0x0000_0008;
pub const CKF_RESTORE_KEY_NOT_NEEDED: u64 = 0x0000_0020;
pub const CKF_CLOCK_ON_TOKEN: u64 = 0x0000_0040;
pub const CKF_TOKEN_INITIALIZED: u64 = 0x0000_0400;
pub const CKF_USER_PIN_COUNT_LOW: u64 = 0x0001_0000;
pub const CKF_USER_PIN_FINAL_TRY: u64 = 0x0002_0000;
pub const CKF_USER_PIN_LOCKED: u64 = 0x0004_0000;
pub const CKF_USER_PIN_TO_BE_CHANGED: u64 = 0x0008_0000;
pub const CKF_SO_PIN_COUNT_LOW: u64 = 0x0010_0000;
pub const CKF_SO_PIN_FINAL_TRY: u64 = 0x0020_0000;
pub const CKF_SO_PIN_LOCKED: u64 = 0x0040_0000;
pub const CKF_SO_PIN_TO_BE_CHANGED: u64 = 0x0080_0000;

/// Flags of a freshly created token: no PINs set, SO PIN locked until changed.
pub const INITIAL_TOKEN_FLAGS: u64 = CKF_RNG
    | CKF_LOGIN_REQUIRED
    | CKF_RESTORE_KEY_NOT_NEEDED
    | CKF_TOKEN_INITIALIZED
    | CKF_SO_PIN_LOCKED
    | CKF_SO_PIN_TO_BE_CHANGED;

/// Cleared when a new SO PIN is stored.
pub const SO_PIN_STATE: u64 =
    CKF_SO_PIN_COUNT_LOW | CKF_SO_PIN_FINAL_TRY | CKF_SO_PIN_LOCKED | CKF_SO_PIN_TO_BE_CHANGED;

/// Cleared when a new user PIN is stored.
pub const USER_PIN_STATE: u64 = CKF_USER_PIN_COUNT_LOW
    | CKF_USER_PIN_FINAL_TRY
    | CKF_USER_PIN_LOCKED
    | CKF_USER_PIN_TO_BE_CHANGED;
