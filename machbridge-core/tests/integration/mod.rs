mod controller_flows;
mod fakes;
mod reconciliation;
