use refflow_error::{RefflowError, Result};

use crate::execution::operators::union::UnionOperator;
use crate::execution::operators::{operator_ref, PhysicalOperator, PhysicalOperatorRef};

pub fn plan(children: Vec<PhysicalOperatorRef>) -> Result<PhysicalOperatorRef> {
    if children.is_empty() {
        return Err(RefflowError::new("union plan node requires at least one child"));
    }
    Ok(operator_ref(PhysicalOperator::Union(UnionOperator::new(
        children,
    ))))
}
