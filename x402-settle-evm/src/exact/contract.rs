//! Solidity interface definitions for on-chain interactions.
//!
//! Contains the minimal ABI surface needed by detection, verification and
//! settlement:
//! - [`IERC20`] - balance, allowance and EIP-712 domain metadata reads
//! - [`IERC2612`] - the `permit` selector scanned for by the detector
//! - [`IEIP3009`] - `transferWithAuthorization` family
//! - [`ISignatureTransfer`] - Permit2 signature transfers
//! - [`IPermitSettlement`] - the `payTo` contract that consumes a permit
//! - [`IProxy`] - `implementation()` getter of upgradeable proxies
//!
//! Calls are encoded with `abi_encode` and executed through
//! [`Eip155ChainReader::call`](crate::chain::Eip155ChainReader::call) or a
//! [`MetaTransaction`](crate::chain::MetaTransaction).

use alloy_sol_types::sol;

sol! {
    /// ERC-20 reads plus the optional metadata used to build EIP-712 domains.
    ///
    /// Reference: EIP-5267 <https://eips.ethereum.org/EIPS/eip-5267>
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function name() external view returns (string);
        function version() external view returns (string);
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
    }
}

sol! {
    /// EIP-2612 permit.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC2612 {
        function permit(
            address owner,
            address spender,
            uint256 value,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

sol! {
    /// ERC-3009 transfer functions.
    ///
    /// Overload order matters: the bytes-signature variant is `_0`, the
    /// (v,r,s) variant is `_1`.
    ///
    /// Reference: <https://eips.ethereum.org/EIPS/eip-3009>
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    interface IEIP3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
        function receiveWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

sol! {
    /// Permit2 `ISignatureTransfer`.
    ///
    /// The on-chain `PermitTransferFrom` has no `spender`: Permit2 uses
    /// `msg.sender` when hashing.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ISignatureTransfer {
        struct TokenPermissions {
            address token;
            uint256 amount;
        }

        struct PermitTransferFrom {
            TokenPermissions permitted;
            uint256 nonce;
            uint256 deadline;
        }

        struct SignatureTransferDetails {
            address to;
            uint256 requestedAmount;
        }

        function permitTransferFrom(
            PermitTransferFrom permit,
            SignatureTransferDetails transferDetails,
            address owner,
            bytes signature
        ) external;

        function permitWitnessTransferFrom(
            PermitTransferFrom permit,
            SignatureTransferDetails transferDetails,
            address owner,
            bytes32 witness,
            string witnessTypeString,
            bytes signature
        ) external;
    }
}

sol! {
    /// Settlement contract deployed at a permit requirement's `payTo`.
    ///
    /// Calls `permit` on the token and then pulls `value` to itself.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    interface IPermitSettlement {
        function settleWithPermit(
            address token,
            address owner,
            uint256 value,
            uint256 deadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

sol! {
    /// Getter exposed by transparent and beacon-style proxies.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IProxy {
        function implementation() external view returns (address);
    }
}
