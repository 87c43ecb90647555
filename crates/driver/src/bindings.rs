use ethers::prelude::abigen;

// Generates the bindings for the `BattleArena` game contract.
abigen!(
    BattleArena,
    r"[
        event GameCreated(uint256 indexed gameId, address indexed player1, address stakeToken, uint256 stakeAmount)
        event PlayerJoined(uint256 indexed gameId, address indexed player2)
        event GameCancelled(uint256 indexed gameId)
        event GameSettled(uint256 indexed gameId, address winner)
        function gamesLength() external view returns (uint256)
        function games(uint256 _gameId) external view returns (address, address, address, uint256, bool, bool, address, bool, bool)
        function gameWinner(uint256 _gameId) external view returns (address)
    ]"
);
