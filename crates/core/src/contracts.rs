//! ABI bindings for the contracts the pipeline talks to.
//!
//! Signatures have to match the deployed contracts exactly, the selectors are
//! derived from them.
use alloy::sol;

// Taken from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/3790c59623e99cb0272ddf84e6a17a5979d06b35/contracts/token/ERC20/IERC20.sol
sol!(
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
);

// Uniswap v3-core IUniswapV3Factory / IUniswapV3PoolImmutables
sol!(
    #[sol(rpc)]
    contract IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address);
    }

    #[sol(rpc)]
    contract IUniswapV3Pool {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
    }
);

// Uniswap swap-router-contracts IV3SwapRouter (SwapRouter02), no deadline field
sol!(
    #[sol(rpc)]
    contract IV3SwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
);

// Aave v3 IPool
sol!(
    #[sol(rpc)]
    contract ILendingPool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
    }
);
