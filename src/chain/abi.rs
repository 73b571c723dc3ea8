//! Solidity surface of the inheritance factory and per-owner contracts.

use alloy::sol_types::SolError;

alloy::sol! {
    interface IInheritanceFactory {
        error InheritanceFactory__ContractAlreadyInactive();
        error OwnableUnauthorizedAccount(address account);

        event MonitoringDeactivated(address indexed contractAddress);

        function getActiveContracts() external view returns (address[] memory);
        function getMonitoringService() external view returns (address);
        function processContractMonitoring(address contractAddress, bool walletHasActivity) external;
    }

    interface IInheritanceContract {
        function getIsActiveForMonitoring() external view returns (bool);
        function getOwner() external view returns (address);
        function getLastActivityTimestamp() external view returns (uint256);
        function getInactivityTime() external view returns (uint256);
        function getIsInheritanceTriggered() external view returns (bool);
        function getContractDetails() external view returns (
            address beneficiary,
            uint256 amount,
            uint256 inactivityTime,
            uint256 lastActivity,
            bool triggered,
            bool claimed,
            uint256 timeRemaining,
            bool needsMonitoring
        );
    }
}

/// Name a known factory revert from its selector, if recognised.
pub fn describe_revert(data: &[u8]) -> Option<&'static str> {
    let selector = data.get(..4)?;
    if selector == IInheritanceFactory::InheritanceFactory__ContractAlreadyInactive::SELECTOR {
        Some("contract already inactive")
    } else if selector == IInheritanceFactory::OwnableUnauthorizedAccount::SELECTOR {
        Some("signer is not the factory's monitoring service")
    } else {
        None
    }
}
