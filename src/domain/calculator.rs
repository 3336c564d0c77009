// Fixed-rate amortization for the payment calculator lesson.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortgageInput {
    pub loan_amount: f64,
    pub down_payment: f64,
    /// Annual interest rate in percent, e.g. 6.5
    pub annual_rate_percent: f64,
    pub term_years: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortgageQuote {
    pub principal: f64,
    pub monthly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculatorError {
    #[error("principal must be positive, got {0}")]
    NonPositivePrincipal(f64),

    #[error("interest rate must be positive, got {0}")]
    NonPositiveRate(f64),

    #[error("term must be positive, got {0} years")]
    NonPositiveTerm(f64),
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `M = P * r(1+r)^n / ((1+r)^n - 1)` with a monthly rate and payment count.
pub fn quote(input: &MortgageInput) -> Result<MortgageQuote, CalculatorError> {
    let principal = input.loan_amount - input.down_payment;
    let monthly_rate = input.annual_rate_percent / 100.0 / 12.0;
    let payments = input.term_years * 12.0;

    // NaN inputs fail these checks as well
    if !(principal > 0.0) {
        return Err(CalculatorError::NonPositivePrincipal(principal));
    }
    if !(monthly_rate > 0.0) {
        return Err(CalculatorError::NonPositiveRate(input.annual_rate_percent));
    }
    if !(payments > 0.0) {
        return Err(CalculatorError::NonPositiveTerm(input.term_years));
    }

    let growth = (1.0 + monthly_rate).powf(payments);
    let monthly_payment = principal * (monthly_rate * growth) / (growth - 1.0);
    let total_payment = monthly_payment * payments;

    Ok(MortgageQuote {
        principal,
        monthly_payment: round_cents(monthly_payment),
        total_payment: round_cents(total_payment),
        total_interest: round_cents(total_payment - principal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_year_fixed() {
        let result = quote(&MortgageInput {
            loan_amount: 350_000.0,
            down_payment: 50_000.0,
            annual_rate_percent: 6.0,
            term_years: 30.0,
        })
        .unwrap();

        assert_eq!(result.principal, 300_000.0);
        assert_eq!(result.monthly_payment, 1798.65);
        assert!((result.total_payment - 647_514.57).abs() < 0.02);
        assert!((result.total_interest - 347_514.57).abs() < 0.02);
    }

    #[test]
    fn rejects_non_positive_inputs() {
        let base = MortgageInput {
            loan_amount: 200_000.0,
            down_payment: 0.0,
            annual_rate_percent: 3.0,
            term_years: 15.0,
        };

        assert_eq!(
            quote(&MortgageInput { down_payment: 200_000.0, ..base }),
            Err(CalculatorError::NonPositivePrincipal(0.0))
        );
        assert_eq!(
            quote(&MortgageInput { annual_rate_percent: 0.0, ..base }),
            Err(CalculatorError::NonPositiveRate(0.0))
        );
        assert_eq!(
            quote(&MortgageInput { term_years: -1.0, ..base }),
            Err(CalculatorError::NonPositiveTerm(-1.0))
        );
        assert!(quote(&base).is_ok());
    }
}
