use crate::infra::{collect_weights, load_registry, parse_policy, parse_weight, Workflows};
use chrono::Utc;
use clap::Args;
use rainworks::config::EngineConfig;
use rainworks::error::AppError;
use rainworks::workflows::allocation::{AllocationError, AllocationPolicy, AllocationRecord};
use rainworks::workflows::bidding::{Auction, BidSubmission};
use rainworks::workflows::escrow::{standard_plan, EscrowEvent, Payment, PaymentRequest};
use rainworks::workflows::registry::{
    check_eligibility, GeoPoint, Ineligibility, InstallerRegistry, Job, JobId,
};
use rainworks::workflows::scoring::Weights;
use rainworks::workflows::Assignment;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    #[arg(long)]
    pub(crate) job_id: String,
    #[arg(long)]
    pub(crate) region: String,
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lon: f64,
    /// Estimated job cost in whole currency units
    #[arg(long)]
    pub(crate) estimated_cost: u64,
    #[arg(long, default_value = "")]
    pub(crate) address: String,
    /// Capabilities the job requires (comma separated)
    #[arg(long = "capability", value_delimiter = ',')]
    pub(crate) capabilities: Vec<String>,
    /// gov_optimized, equitable, or user_choice
    #[arg(long, value_parser = parse_policy, default_value = "gov_optimized")]
    pub(crate) policy: AllocationPolicy,
    /// Custom weight as criterion=value; repeat for each criterion (user_choice only)
    #[arg(long = "weight", value_parser = parse_weight)]
    pub(crate) weights: Vec<(String, f64)>,
    /// Installer roster CSV. Defaults to the bundled sample roster.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Installer roster CSV. Defaults to the bundled sample roster.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Estimated cost of the demo jobs
    #[arg(long, default_value_t = 115_000)]
    pub(crate) estimated_cost: u64,
    /// Bidding window for the demo auction
    #[arg(long, default_value_t = 48)]
    pub(crate) deadline_hours: u32,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            roster: None,
            estimated_cost: 115_000,
            deadline_hours: 48,
        }
    }
}

/// Price as a percentage of the estimate, timeline in days, warranty in months.
const DEMO_BID_TERMS: [(u64, u32, u32); 3] = [(96, 30, 24), (92, 38, 36), (104, 21, 60)];

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let registry = Arc::new(load_registry(args.roster.as_deref())?);
    let workflows = Workflows::new(registry, &EngineConfig::default());

    let weights = collect_weights(&args.weights)
        .map(Weights::from_named)
        .transpose()
        .map_err(AllocationError::from)?;

    let job = Job {
        id: JobId(args.job_id),
        address: args.address,
        region: args.region,
        location: GeoPoint {
            lat: args.lat,
            lon: args.lon,
        },
        estimated_cost: args.estimated_cost,
        required_capabilities: args.capabilities.into_iter().collect(),
        created_at: Utc::now(),
    };

    let record = workflows.engine.allocate(&job, args.policy, weights)?;
    render_allocation(&record);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        roster,
        estimated_cost,
        deadline_hours,
    } = args;

    let registry = Arc::new(load_registry(roster.as_deref())?);
    let workflows = Workflows::new(registry.clone(), &EngineConfig::default());

    println!("Rainworks demo");

    let allocated_job = demo_job("JOB-DEMO-1", estimated_cost);
    println!(
        "\nJob {} in {} (estimate {})",
        allocated_job.id.0, allocated_job.region, allocated_job.estimated_cost
    );
    let records = [AllocationPolicy::GovOptimized, AllocationPolicy::Equitable]
        .into_iter()
        .map(|policy| workflows.engine.allocate(&allocated_job, policy, None))
        .collect::<Result<Vec<_>, _>>()?;
    for record in &records {
        render_allocation(record);
    }
    if let Some(record) = records.first() {
        let payment = settle(&workflows, &Assignment::from(record))?;
        render_payment(&payment);
    }

    let auction_job = demo_job("JOB-DEMO-2", estimated_cost);
    let bidders: Vec<_> = registry
        .snapshot()
        .map_err(AllocationError::from)?
        .into_iter()
        .filter(|installer| {
            matches!(
                check_eligibility(installer, &auction_job),
                Ok(()) | Err(Ineligibility::NoCapacity)
            )
        })
        .take(DEMO_BID_TERMS.len())
        .collect();
    if bidders.is_empty() {
        println!("\nNo installer in the roster can bid on {}", auction_job.id.0);
        return Ok(());
    }

    let auction = workflows
        .coordinator
        .open(auction_job, Some(deadline_hours))?;
    println!(
        "\nAuction {} open until {}",
        auction.id.0,
        auction.deadline.format("%Y-%m-%d %H:%M UTC")
    );

    for (installer, (percent, timeline_days, warranty_months)) in
        bidders.iter().zip(DEMO_BID_TERMS)
    {
        workflows.coordinator.submit_bid(
            &auction.id,
            BidSubmission {
                installer_id: installer.id.clone(),
                price: estimated_cost * percent / 100,
                timeline_days,
                warranty_months,
            },
        )?;
    }

    workflows.coordinator.close(&auction.id)?;
    let ranked = workflows.coordinator.get(&auction.id)?;
    render_bids(&ranked);

    let Some(leader) = ranked.bids.first().map(|bid| bid.id.clone()) else {
        return Ok(());
    };
    let awarded = workflows.coordinator.award(&auction.id, &leader)?;
    let Some(assignment) = awarded.winning_bid().and_then(Assignment::from_awarded_bid) else {
        println!("Auction {} has no awarded bid", awarded.id.0);
        return Ok(());
    };
    println!(
        "Awarded {} to {} at {}",
        awarded.id.0, assignment.installer_id.0, assignment.agreed_amount
    );

    let payment = settle(&workflows, &assignment)?;
    render_payment(&payment);

    println!("\nGateway events");
    for event in workflows.gateway.events() {
        println!("  {}", describe_event(&event));
    }

    Ok(())
}

fn demo_job(id: &str, estimated_cost: u64) -> Job {
    Job {
        id: JobId(id.to_string()),
        address: "14 Lake View Road, Hebbal".to_string(),
        region: "BLR-N".to_string(),
        location: GeoPoint {
            lat: 13.0358,
            lon: 77.5970,
        },
        estimated_cost,
        required_capabilities: BTreeSet::from(["recharge-pit".to_string()]),
        created_at: Utc::now(),
    }
}

/// Funds an escrow for the assignment and drives every milestone to release.
fn settle(workflows: &Workflows, assignment: &Assignment) -> Result<Payment, AppError> {
    let ledger = &workflows.ledger;
    let request =
        PaymentRequest::from_assignment(assignment, standard_plan(assignment.agreed_amount));
    let payment = ledger.create_payment(request)?;
    ledger.fund_escrow(&payment.id)?;

    for milestone in &payment.milestones {
        ledger.start_milestone(&milestone.id)?;
        ledger.complete_milestone(&milestone.id)?;
        ledger.verify_milestone(&milestone.id)?;
        ledger.release_milestone(&milestone.id)?;
    }

    Ok(ledger.close_payment(&payment.id)?)
}

fn render_allocation(record: &AllocationRecord) {
    println!("\nAllocation ({})", record.policy.label());
    println!(
        "  winner: {} (score {:.2})",
        record.installer_id.0, record.score
    );
    println!("  {}", record.justification);
    for (criterion, contribution) in &record.breakdown {
        println!("    {:<12} {:>6.2}", criterion.name(), contribution);
    }
    if !record.alternatives.is_empty() {
        println!("  alternatives:");
        for (position, alternative) in record.alternatives.iter().enumerate() {
            println!(
                "    {}. {} ({:.2})",
                position + 2,
                alternative.installer_id.0,
                alternative.score
            );
        }
    }
}

fn render_bids(auction: &Auction) {
    println!("Bids ({})", auction.state.label());
    for bid in &auction.bids {
        println!(
            "  #{} {} price {} / {} days / {} months warranty -> {:.2}",
            bid.rank, bid.installer_id.0, bid.price, bid.timeline_days, bid.warranty_months, bid.score
        );
    }
}

fn render_payment(payment: &Payment) {
    println!(
        "\nPayment {} for {}: {} released, {} held ({})",
        payment.id.0,
        payment.installer_id.0,
        payment.released_amount,
        payment.escrow_balance,
        payment.status.label()
    );
    for milestone in &payment.milestones {
        println!(
            "  {}. {:<32} {:>8} {}",
            milestone.sequence,
            milestone.name,
            milestone.amount,
            milestone.status.label()
        );
    }
}

fn describe_event(event: &EscrowEvent) -> String {
    match event {
        EscrowEvent::Funded {
            payment_id, amount, ..
        } => format!("funded {} with {}", payment_id.0, amount),
        EscrowEvent::MilestoneReleased {
            milestone_id,
            installer_id,
            amount,
            ..
        } => format!(
            "released {} to {} for {}",
            amount, installer_id.0, milestone_id.0
        ),
        EscrowEvent::PaymentReleased {
            payment_id,
            total_amount,
            ..
        } => format!("payment {} fully released ({})", payment_id.0, total_amount),
    }
}
