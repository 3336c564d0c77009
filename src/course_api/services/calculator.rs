use poem_openapi::payload::Json;

use crate::{
    course_api::models::{ErrorDto, MortgageQuoteDto, MortgageRequestDto, MortgageResponse},
    domain::calculator::{self, MortgageInput},
};

pub struct CalculatorService;

impl CalculatorService {
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn mortgage(&self, request: MortgageRequestDto) -> MortgageResponse {
        let input = MortgageInput {
            loan_amount: request.loan_amount,
            down_payment: request.down_payment.unwrap_or(0.0),
            annual_rate_percent: request.annual_rate_percent,
            term_years: request.term_years,
        };
        match calculator::quote(&input) {
            Ok(quote) => MortgageResponse::Ok(Json(MortgageQuoteDto::from(quote))),
            Err(e) => {
                tracing::debug!(error = %e, "rejected mortgage inputs");
                MortgageResponse::BadRequest(Json(ErrorDto::from(e.to_string())))
            }
        }
    }
}
