//! CLI command handlers for sessions and instances.

use chrono::Utc;

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::pairing::PairingCountdown;
use crate::provisioning::{
    InstanceDraft, InstanceProvisioningOrchestrator, MessagingInstance, ProvisioningOutcome,
};
use crate::session::Session;

use super::{CreateArgs, InstanceCommands, LoginArgs, QrArgs, ResetArgs, SessionCommands};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `waprov session <command>`.
pub async fn handle_session(command: SessionCommands) -> CliResult {
    let config = ClientConfig::from_env()?;
    let session = Session::from_config(&config)?;
    match command {
        SessionCommands::Status => session_status(&session),
        SessionCommands::Login(args) => session_login(&session, args),
        SessionCommands::Logout => {
            session.logout()?;
            println!("Signed out.");
            Ok(())
        }
    }
}

fn session_status(session: &Session) -> CliResult {
    match session.credentials() {
        None => println!("Not signed in."),
        Some(credentials) => {
            let now = Utc::now();
            let refresh = if credentials.refresh_token.is_some() {
                "yes"
            } else {
                "no"
            };
            match credentials.expires_in(now) {
                Some(_) if credentials.is_expired(now) => {
                    println!("Signed in (access token expired, refresh token: {refresh})")
                }
                Some(left) => println!(
                    "Signed in (expires in {}s, refresh token: {refresh})",
                    left.num_seconds()
                ),
                None => println!("Signed in (no expiry, refresh token: {refresh})"),
            }
        }
    }
    Ok(())
}

fn session_login(session: &Session, args: LoginArgs) -> CliResult {
    session.sign_in(Credentials::new(args.access_token, args.refresh_token))?;
    println!("Credentials saved.");
    Ok(())
}

/// Handle `waprov instances <command>`.
pub async fn handle_instances(command: InstanceCommands) -> CliResult {
    let config = ClientConfig::from_env()?;
    let session = Session::from_config(&config)?;
    let orchestrator = InstanceProvisioningOrchestrator::from_config(&config, &session);

    match command {
        InstanceCommands::List => {
            let instances = orchestrator.list_instances().await?;
            if instances.is_empty() {
                println!("No instances.");
            }
            for instance in &instances {
                println!(
                    "{:<12} {:<10} {:<20} {:<15} {}",
                    instance.local_id,
                    instance.instance_code,
                    instance.display_name,
                    instance.phone_number,
                    instance.connection_state
                );
            }
            Ok(())
        }
        InstanceCommands::Get(args) => {
            let instance = orchestrator.get_instance(&args.id).await?;
            print_instance(&instance);
            if !instance.external_instance_id.is_empty() {
                let live = orchestrator.check_connection(&instance).await?;
                println!("   Live state: {live}");
            }
            Ok(())
        }
        InstanceCommands::Create(args) => create(&orchestrator, args).await,
        InstanceCommands::Reset(args) => reset(&orchestrator, args).await,
        InstanceCommands::Qr(args) => write_qr(&orchestrator, args).await,
    }
}

async fn create(orchestrator: &InstanceProvisioningOrchestrator, args: CreateArgs) -> CliResult {
    let draft = InstanceDraft::builder()
        .display_name(args.name)
        .phone_number(args.phone)
        .maybe_integration(args.integration)
        .build();
    let outcome = orchestrator.create(draft).await?;
    println!("Instance created.");
    report_outcome(outcome, args.watch).await;
    Ok(())
}

async fn reset(orchestrator: &InstanceProvisioningOrchestrator, args: ResetArgs) -> CliResult {
    println!("Resetting {}...", args.id);
    let outcome = orchestrator
        .reset_by_id(&args.id, args.phone.as_deref())
        .await?;
    println!("Instance reset.");
    report_outcome(outcome, args.watch).await;
    Ok(())
}

async fn write_qr(orchestrator: &InstanceProvisioningOrchestrator, args: QrArgs) -> CliResult {
    let instance = orchestrator.get_instance(&args.id).await?;
    let png = instance
        .pairing_payload
        .as_ref()
        .map(|payload| payload.qr_png())
        .transpose()?
        .flatten()
        .ok_or_else(|| format!("instance {} has no stored QR code", args.id))?;
    std::fs::write(&args.out, png)?;
    println!("QR written to {}", args.out.display());
    Ok(())
}

async fn report_outcome(outcome: ProvisioningOutcome, watch: bool) {
    print_instance(&outcome.instance);
    if let Some(code) = outcome
        .instance
        .pairing_payload
        .as_ref()
        .and_then(|payload| payload.pairing_code.as_deref())
    {
        println!("   Pairing code: {code}");
    }
    if !watch {
        println!(
            "   Scan the QR within {}s (waprov instances qr {} --out qr.png)",
            outcome.pairing.remaining_seconds(),
            outcome.instance.local_id
        );
        return;
    }

    let countdown = PairingCountdown::spawn(outcome.pairing);
    let mut updates = countdown.subscribe();
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow().clone();
        if snapshot.is_expired {
            println!("\nPairing window expired; reset the instance to get a new QR.");
            break;
        }
        eprint!("\r   {}s left to scan ", snapshot.remaining_seconds);
    }
    let _ = countdown.join().await;
}

fn print_instance(instance: &MessagingInstance) {
    println!("   Local id:    {}", instance.local_id);
    println!("   Code:        {}", instance.instance_code);
    println!("   Name:        {}", instance.display_name);
    println!("   Instance:    {}", instance.instance_name);
    println!("   Phone:       {}", instance.phone_number);
    println!("   Status:      {}", instance.status);
    println!("   Connection:  {}", instance.connection_state);
}
