//! CLI tool for deploying and interacting with the Coffer vault contracts.

use coffer_contracts::coffer::coffer::Coffer;
use coffer_contracts::coffer::minted::TokenHub;
use coffer_contracts::coffer::strategy::SimpleStrategy;
use coffer_contracts::coffer::AssetKind;
use coffer_contracts::token::TestToken;
use odra::casper_types::U256;
use odra::host::HostEnv;
use odra::prelude::{Address, Addressable};
use odra::schema::casper_contract_schema::NamedCLType;
use odra_cli::{
    deploy::DeployScript,
    scenario::{Args, Error, Scenario, ScenarioMetadata},
    CommandArg, ContractProvider, DeployedContractsContainer, DeployerExt,
    OdraCli,
};

/// Deploys the Coffer vault contract.
pub struct CofferDeployScript;

impl DeployScript for CofferDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        use odra::host::NoArgs;

        let _coffer = Coffer::load_or_deploy(
            &env,
            NoArgs,
            container,
            500_000_000_000 // Gas limit for vault deployment
        )?;

        Ok(())
    }
}

/// Deploys the token hub and wires it into the vault.
/// Requires the Coffer to be deployed first.
pub struct TokenHubDeployScript;

impl DeployScript for TokenHubDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        use coffer_contracts::coffer::minted::TokenHubInitArgs;

        let mut coffer = container.contract_ref::<Coffer>(env)?;
        let coffer_address = coffer.address().clone();

        let hub = TokenHub::load_or_deploy(
            &env,
            TokenHubInitArgs {
                coffer: coffer_address,
            },
            container,
            300_000_000_000
        )?;

        env.set_gas(10_000_000_000);
        coffer.set_token_hub(hub.address().clone());

        Ok(())
    }
}

/// Deploys the complete vault system (Coffer + TokenHub).
pub struct VaultDeployScript;

impl DeployScript for VaultDeployScript {
    fn deploy(
        &self,
        env: &HostEnv,
        container: &mut DeployedContractsContainer
    ) -> Result<(), odra_cli::deploy::Error> {
        // Deploy the vault first
        CofferDeployScript.deploy(env, container)?;

        // Then the token hub
        TokenHubDeployScript.deploy(env, container)?;

        Ok(())
    }
}

/// Scenario to register a CEP-18 token as a vault asset.
pub struct RegisterAssetScenario;

impl Scenario for RegisterAssetScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new(
                "token",
                "Address of the CEP-18 token contract",
                NamedCLType::Key,
            ),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut coffer = container.contract_ref::<Coffer>(env)?;
        let token = args.get_single::<Address>("token")?;

        env.set_gas(50_000_000_000);
        coffer.try_register_asset(AssetKind::External, token, None, 0)?;

        println!("Asset registered successfully!");
        Ok(())
    }
}

impl ScenarioMetadata for RegisterAssetScenario {
    const NAME: &'static str = "register-asset";
    const DESCRIPTION: &'static str = "Registers a CEP-18 token as a vault asset";
}

/// Scenario to deposit tokens into a vault asset.
pub struct DepositScenario;

impl Scenario for DepositScenario {
    fn args(&self) -> Vec<CommandArg> {
        vec![
            CommandArg::new(
                "asset_id",
                "Id of the registered asset",
                NamedCLType::U32,
            ),
            CommandArg::new(
                "amount",
                "Underlying amount to deposit",
                NamedCLType::U256,
            ),
        ]
    }

    fn run(
        &self,
        env: &HostEnv,
        container: &DeployedContractsContainer,
        args: Args
    ) -> Result<(), Error> {
        let mut coffer = container.contract_ref::<Coffer>(env)?;
        let asset_id = args.get_single::<u32>("asset_id")?;
        let amount = args.get_single::<U256>("amount")?;
        let caller = env.caller();

        env.set_gas(100_000_000_000);
        coffer.try_deposit(asset_id, caller, caller, amount, U256::zero())?;

        println!("Deposit settled successfully!");
        Ok(())
    }
}

impl ScenarioMetadata for DepositScenario {
    const NAME: &'static str = "deposit";
    const DESCRIPTION: &'static str = "Deposits underlying into a vault asset";
}

/// Main function to run the CLI tool.
pub fn main() {
    OdraCli::new()
        .about("CLI tool for the Coffer vault contracts")
        // Deploy scripts
        .deploy(CofferDeployScript)
        .deploy(TokenHubDeployScript)
        .deploy(VaultDeployScript)
        // Contract references
        .contract::<Coffer>()
        .contract::<TokenHub>()
        .contract::<SimpleStrategy>()
        .contract::<TestToken>()
        // Scenarios
        .scenario(RegisterAssetScenario)
        .scenario(DepositScenario)
        .build()
        .run();
}
