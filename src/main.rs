use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use parkpay::application::dashboard::VehicleDashboard;
use parkpay::application::orchestrator::PaymentOrchestrator;
use parkpay::application::refresh::RefreshHub;
use parkpay::application::slots::SlotBoard;
use parkpay::config::AppConfig;
use parkpay::domain::money::Amount;
use parkpay::domain::payment::{PaymentMethod, PaymentOutcome, PaymentRequest};
use parkpay::domain::ports::{CheckoutWidgetArc, LedgerGatewayArc, PaymentBackendArc};
use parkpay::domain::slot::{SlotStatus, SlotView};
use parkpay::infrastructure::checkout::BrowserCheckout;
use parkpay::infrastructure::in_memory::Sandbox;
use parkpay::infrastructure::ledger::JsonRpcLedger;
use parkpay::infrastructure::rest::RestPaymentBackend;
use parkpay::interfaces::csv::record_writer::RecordWriter;
use parkpay::logging;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to ./parkpay.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use seeded in-memory providers instead of the backend, ledger and checkout.
    #[arg(long, global = true)]
    sandbox: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pay the parking fee of a vehicle
    Pay {
        #[arg(long)]
        vehicle: String,
        /// cash, card, crypto, paypal or points
        #[arg(long)]
        method: PaymentMethod,
        /// Required for points; card and paypal fall back to the default fee
        #[arg(long)]
        amount: Option<Amount>,
    },
    /// Loyalty points
    Points {
        #[command(subcommand)]
        action: PointsAction,
    },
    /// Saved cards on file
    Cards,
    /// Register a vehicle under the connected wallet
    Register {
        #[arg(long)]
        vehicle: String,
        #[arg(long)]
        name: String,
    },
    /// Vehicles of the connected wallet
    Vehicles,
    /// Settled payments of the connected wallet, most recent first
    History,
    /// Parking slots
    Slots {
        #[command(subcommand)]
        action: SlotsAction,
    },
}

#[derive(Subcommand)]
enum PointsAction {
    Balance,
    TopUp {
        #[arg(long)]
        amount: Option<Amount>,
    },
}

#[derive(Subcommand)]
enum SlotsAction {
    List,
    Book {
        #[arg(long)]
        slot: u32,
        #[arg(long)]
        vehicle: String,
    },
    Clear {
        #[arg(long)]
        slot: u32,
    },
}

#[derive(Serialize)]
struct BalanceRow {
    points_balance: Decimal,
}

#[derive(Serialize)]
struct SlotRow {
    slot_id: u32,
    status: SlotStatus,
    plate: Option<String>,
    view: &'static str,
}

struct App {
    orchestrator: PaymentOrchestrator,
    dashboard: Arc<VehicleDashboard>,
    slots: SlotBoard,
}

impl App {
    async fn build(config: &AppConfig, sandbox: bool) -> parkpay::error::Result<Self> {
        let ledger: LedgerGatewayArc;
        let backend: PaymentBackendArc;
        let checkout: CheckoutWidgetArc;

        if sandbox {
            info!("Using in-memory sandbox providers");
            let seeded = Sandbox::seeded().await;
            ledger = seeded.ledger;
            backend = seeded.backend;
            checkout = seeded.checkout;
        } else {
            ledger = Arc::new(JsonRpcLedger::new(&config.ledger)?);
            backend = Arc::new(RestPaymentBackend::new(
                &config.backend.base_url,
                Duration::from_secs(config.backend.timeout_secs),
            )?);
            checkout = Arc::new(BrowserCheckout::new(&config.checkout));
        }

        let refresh = RefreshHub::new();
        let dashboard = Arc::new(VehicleDashboard::new(ledger.clone(), refresh.clone()));
        let slots = SlotBoard::new(
            backend.clone(),
            dashboard.clone(),
            refresh.clone(),
            config.payment.slot_rate_per_hour,
        );
        let orchestrator = PaymentOrchestrator::new(
            ledger,
            backend,
            checkout,
            config.orchestrator_settings()?,
            refresh,
        );

        Ok(Self {
            orchestrator,
            dashboard,
            slots,
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Pay {
                vehicle,
                method,
                amount,
            } => {
                let mut request = PaymentRequest::new(vehicle, method);
                if let Some(amount) = amount {
                    request = request.with_amount(amount);
                }
                let outcome = self
                    .orchestrator
                    .submit_payment(request)
                    .await
                    .into_diagnostic()?;
                report(outcome)
            }
            Command::Points { action } => {
                let balance = match action {
                    PointsAction::Balance => self.orchestrator.points_balance().await,
                    PointsAction::TopUp { amount } => self.orchestrator.top_up_points(amount).await,
                }
                .into_diagnostic()?;
                print([BalanceRow {
                    points_balance: balance.amount(),
                }])
            }
            Command::Cards => print(self.orchestrator.saved_cards().await.into_diagnostic()?),
            Command::Register { vehicle, name } => {
                let outcome = self
                    .dashboard
                    .register_vehicle(&vehicle, &name)
                    .await
                    .into_diagnostic()?;
                report(outcome)
            }
            Command::Vehicles => print(self.dashboard.vehicles().await.into_diagnostic()?),
            Command::History => print(self.dashboard.payment_history().await.into_diagnostic()?),
            Command::Slots { action } => {
                match action {
                    SlotsAction::List => {}
                    SlotsAction::Book { slot, vehicle } => {
                        self.slots.book_slot(slot, &vehicle).await.into_diagnostic()?
                    }
                    SlotsAction::Clear { slot } => {
                        self.slots.clear_slot(slot).await.into_diagnostic()?
                    }
                }
                let rows = self
                    .slots
                    .overview()
                    .await
                    .into_diagnostic()?
                    .into_iter()
                    .map(|(slot, view)| SlotRow {
                        slot_id: slot.id,
                        status: slot.status,
                        plate: slot.plate,
                        view: match view {
                            SlotView::Free => "free",
                            SlotView::Mine(_) => "mine",
                            SlotView::Taken => "taken",
                        },
                    });
                print(rows)
            }
        }
    }
}

fn print<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = RecordWriter::new(stdout.lock());
    writer.write_records(rows).into_diagnostic()
}

/// Prints the outcome and turns anything but success into a failing exit.
fn report(outcome: PaymentOutcome) -> Result<()> {
    let success = outcome.is_success();
    let status = outcome.status;
    print([outcome])?;
    if success {
        Ok(())
    } else {
        Err(miette!("Attempt ended as {status}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).into_diagnostic()?;
    let app = App::build(&config, cli.sandbox).await.into_diagnostic()?;
    app.run(cli.command).await
}
