pub mod reconciliationdtos;
pub mod webhookdtos;
